//! Prompt assembly: the system prompt and history pruning.

use deskpilot_protocol::{ChatMessage, Role};

use crate::config::{AgentConfig, DesktopConfig};

/// Build the system prompt describing the action vocabulary and the desktop size.
pub fn system_prompt(desktop: &DesktopConfig) -> String {
    format!(
        r#"You are a helpful assistant with access to a computer. You control a virtual desktop and can perform various actions.

IMPORTANT: Always start every interaction with taking a screenshot to see the current state of the desktop.

Available actions you can perform:
1. screenshot - Take a screenshot of the current desktop (ALWAYS START WITH THIS)
2. wait - Wait for a specified duration in seconds (max 2 seconds)
3. left_click - Click at coordinate [x, y]
4. double_click - Double click at coordinate [x, y]
5. right_click - Right click at coordinate [x, y]
6. mouse_move - Move mouse to coordinate [x, y]
7. type - Type text
8. key - Press a key given in "text" (like "Return", "Tab", "Escape")
9. scroll - Scroll with scroll_direction ("up"/"down") and scroll_amount
10. left_click_drag - Drag from start_coordinate to coordinate
11. bash - Execute a bash command

Desktop resolution: {width}x{height}

When you want to perform an action, respond with a JSON object containing the action details.
For example:
- {{"action": "screenshot"}}
- {{"action": "left_click", "coordinate": [100, 200]}}
- {{"action": "type", "text": "hello world"}}
- {{"action": "bash", "command": "ls -la"}}

Always take a screenshot first to understand the current state before performing any actions."#,
        width = desktop.width,
        height = desktop.height,
    )
}

/// Reduce client history to what is sent upstream.
///
/// Client system messages and empty messages are dropped, only the most recent
/// `max_history_messages` are kept, and each content is cut to `max_message_chars`
/// characters. Relative order never changes.
pub fn prune_history(messages: &[ChatMessage], limits: &AgentConfig) -> Vec<ChatMessage> {
    let kept: Vec<&ChatMessage> = messages
        .iter()
        .filter(|m| m.role != Role::System && !m.content.trim().is_empty())
        .collect();

    let skip = kept.len().saturating_sub(limits.max_history_messages);
    kept.into_iter()
        .skip(skip)
        .map(|m| ChatMessage::new(m.role, truncate_chars(&m.content, limits.max_message_chars)))
        .collect()
}

/// System prompt followed by the pruned history.
pub fn build_messages(
    history: &[ChatMessage],
    desktop: &DesktopConfig,
    limits: &AgentConfig,
) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(system_prompt(desktop))];
    messages.extend(prune_history(history, limits));
    messages
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
