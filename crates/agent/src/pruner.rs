//! History Pruner — bounds the transcript sent on each model call.

use ticketforge_core::message::{Message, Role};

/// Keep the most recent `max_user` user messages and `max_model` assistant
/// messages. System and tool-result messages are always kept. The result
/// preserves the original order.
pub fn prune(messages: &[Message], max_user: usize, max_model: usize) -> Vec<Message> {
    let mut users = 0;
    let mut models = 0;
    let mut kept: Vec<&Message> = Vec::with_capacity(messages.len());

    for msg in messages.iter().rev() {
        let keep = match msg.role {
            Role::User => {
                users += 1;
                users <= max_user
            }
            Role::Assistant => {
                models += 1;
                models <= max_model
            }
            Role::System | Role::Tool => true,
        };
        if keep {
            kept.push(msg);
        }
    }

    kept.into_iter().rev().cloned().collect()
}
