//! Embedded chat page
//!
//! A single self-contained HTML page served at `/`. It drives the JSON
//! API with fetch calls; no assets, no build step.

pub const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Gondola Chat</title>
    <style>
        html, body {
            margin: 0; padding: 0;
            height: 100%; width: 100%;
            font-family: Arial, sans-serif;
            background-color: #2c2c2c;
            color: #ccc;
        }
        #container {
            display: flex; flex-direction: column;
            height: 100%; max-width: 900px; margin: 0 auto;
        }
        #toolbar {
            display: flex; gap: 8px; align-items: center;
            padding: 10px; border-bottom: 1px solid #444;
        }
        #toolbar button, #send {
            background-color: #444; color: #ccc;
            border: 1px solid #666; border-radius: 4px;
            padding: 6px 12px; cursor: pointer;
        }
        #toolbar button.active { background-color: #1a73e8; color: #fff; }
        #settings {
            display: none; padding: 10px; border-bottom: 1px solid #444;
        }
        #settings.open { display: block; }
        #settings label { display: inline-block; margin: 4px 12px 4px 0; }
        #settings input[type=text], #settings input[type=number], #settings textarea {
            background-color: #1e1e1e; color: #ccc;
            border: 1px solid #555; border-radius: 3px; padding: 4px;
        }
        #log {
            flex: 1; overflow-y: auto; padding: 12px;
        }
        .msg { margin: 8px 0; padding: 8px 12px; border-radius: 6px; white-space: pre-wrap; }
        .msg.user { background-color: #1a3a5c; }
        .msg.assistant { background-color: #3a3a3a; }
        .msg img { max-width: 100%; border-radius: 4px; }
        #composer {
            display: flex; gap: 8px; padding: 10px; border-top: 1px solid #444;
        }
        #input {
            flex: 1; background-color: #1e1e1e; color: #ccc;
            border: 1px solid #555; border-radius: 4px; padding: 8px;
            resize: none;
        }
    </style>
</head>
<body>
<div id="container">
    <div id="toolbar">
        <button id="mode-text" class="active">Text</button>
        <button id="mode-image">Image</button>
        <button id="mode-agent">Agent</button>
        <button id="toggle-settings">Settings</button>
        <button id="new-chat">New Chat</button>
    </div>
    <div id="settings">
        <label>Model <input type="text" id="model" placeholder="default"></label>
        <label>Temperature <input type="number" id="temperature" step="0.1" min="0" max="2" value="0.7"></label>
        <label>Max tokens <input type="number" id="max_tokens" value="7000"></label>
        <label>API key <input type="text" id="api_key" placeholder="server default"></label>
        <label><input type="checkbox" id="auto_execute"> Auto-execute commands</label>
        <br>
        <label>System prompt <textarea id="system_prompt" rows="2" cols="60">You are a helpful assistant.</textarea></label>
    </div>
    <div id="log"></div>
    <div id="composer">
        <textarea id="input" rows="2" placeholder="Type a message..."></textarea>
        <button id="send">Send</button>
    </div>
</div>
<script>
    let mode = "text";

    function setMode(next) {
        mode = next;
        for (const name of ["text", "image", "agent"]) {
            document.getElementById("mode-" + name).classList.toggle("active", name === next);
        }
    }
    document.getElementById("mode-text").onclick = () => setMode("text");
    document.getElementById("mode-image").onclick = () => setMode("image");
    document.getElementById("mode-agent").onclick = () => setMode("agent");
    document.getElementById("toggle-settings").onclick = () => {
        document.getElementById("settings").classList.toggle("open");
    };

    function appendMessage(cls, content, isImage) {
        const log = document.getElementById("log");
        const div = document.createElement("div");
        div.className = "msg " + cls;
        if (isImage && content.startsWith("data:")) {
            const img = document.createElement("img");
            img.src = content;
            div.appendChild(img);
        } else {
            div.textContent = content;
        }
        log.appendChild(div);
        log.scrollTop = log.scrollHeight;
    }

    function overrides() {
        const body = { mode: mode };
        const model = document.getElementById("model").value.trim();
        if (model) body.model = model;
        const apiKey = document.getElementById("api_key").value.trim();
        if (apiKey) body.api_key = apiKey;
        body.temperature = parseFloat(document.getElementById("temperature").value);
        body.max_tokens = parseInt(document.getElementById("max_tokens").value, 10);
        if (mode === "text") {
            body.system_prompt = document.getElementById("system_prompt").value;
        }
        if (mode === "agent") {
            body.auto_execute = document.getElementById("auto_execute").checked;
        }
        return body;
    }

    async function send() {
        const input = document.getElementById("input");
        const message = input.value.trim();
        if (!message) return;
        input.value = "";
        appendMessage("user", message, false);

        const body = overrides();
        body.message = message;
        if (mode === "image") body.prompt = message;

        try {
            const response = await fetch("/chat", {
                method: "POST",
                headers: { "Content-Type": "application/json" },
                body: JSON.stringify(body)
            });
            const data = await response.json();
            if (mode === "image") {
                appendMessage("assistant", data.image_url, true);
            } else {
                appendMessage("assistant", data.reply, false);
            }
        } catch (err) {
            appendMessage("assistant", "Request failed: " + err, false);
        }
    }

    document.getElementById("send").onclick = send;
    document.getElementById("input").addEventListener("keydown", (event) => {
        if (event.key === "Enter" && !event.shiftKey) {
            event.preventDefault();
            send();
        }
    });

    document.getElementById("new-chat").onclick = async () => {
        await fetch("/new_chat", {
            method: "POST",
            headers: { "Content-Type": "application/json" },
            body: JSON.stringify({ keep_history: false })
        });
        document.getElementById("log").innerHTML = "";
    };
</script>
</body>
</html>
"##;
