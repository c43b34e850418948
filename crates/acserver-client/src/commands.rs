//! Admin chat commands.
//!
//! A driver authenticates with `/admin <password>`; the flag sticks to the
//! driver for as long as they stay connected, across session rotations.
//! Everything here is pure: the processor turns a chat line into the
//! requests to send and never touches the transport.

use openracing_acserver_protocol::Message;

/// What a chat line asks the client to do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutcome {
    /// Requests to send, in order.
    pub requests: Vec<Message>,
    /// The sender authenticated successfully.
    pub grant_admin: bool,
}

impl CommandOutcome {
    fn reply(car_id: u8, message: impl Into<String>) -> Self {
        Self {
            requests: vec![Message::SendChat {
                car_id,
                message: message.into(),
            }],
            grant_admin: false,
        }
    }

    fn request(message: Message) -> Self {
        Self {
            requests: vec![message],
            grant_admin: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandProcessor {
    admin_password: String,
}

impl CommandProcessor {
    #[must_use]
    pub fn new(admin_password: impl Into<String>) -> Self {
        Self {
            admin_password: admin_password.into(),
        }
    }

    /// Interpret a chat line from `car_id`.
    ///
    /// Returns `None` when the line is not one of our commands; the server
    /// has its own slash commands and those pass through untouched.
    #[must_use]
    pub fn process(&self, car_id: u8, text: &str, is_admin: bool) -> Option<CommandOutcome> {
        // The password is everything after the single separating space,
        // compared byte for byte.
        if text == "/admin" {
            return Some(self.authenticate(car_id, ""));
        }
        if let Some(password) = text.strip_prefix("/admin ") {
            return Some(self.authenticate(car_id, password));
        }

        let text = text.trim();
        let (command, args) = text.split_once(char::is_whitespace).unwrap_or((text, ""));
        let args = args.trim();

        if !matches!(
            command,
            "/send_chat" | "/broadcast" | "/kick" | "/next_session" | "/restart_session"
        ) {
            return None;
        }

        if !is_admin {
            return Some(CommandOutcome::reply(
                car_id,
                "You are not authorized to use admin commands",
            ));
        }

        let outcome = match command {
            "/send_chat" => send_chat(car_id, args),
            "/broadcast" if args.is_empty() => {
                CommandOutcome::reply(car_id, "Usage: /broadcast <text>")
            }
            "/broadcast" => CommandOutcome::request(Message::BroadcastChat {
                message: args.to_string(),
            }),
            "/kick" => match args.parse::<u8>() {
                Ok(target) => CommandOutcome::request(Message::KickUser { car_id: target }),
                Err(_) => CommandOutcome::reply(car_id, format!("Invalid car id: '{args}'")),
            },
            "/next_session" => CommandOutcome::request(Message::NextSession),
            _ => CommandOutcome::request(Message::RestartSession),
        };
        Some(outcome)
    }

    fn authenticate(&self, car_id: u8, password: &str) -> CommandOutcome {
        if self.admin_password.is_empty() {
            return CommandOutcome::reply(car_id, "Admin commands are disabled");
        }
        if password == self.admin_password {
            CommandOutcome {
                grant_admin: true,
                ..CommandOutcome::reply(car_id, "You are now admin")
            }
        } else {
            CommandOutcome::reply(car_id, "Wrong admin password")
        }
    }
}

fn send_chat(sender: u8, args: &str) -> CommandOutcome {
    let (target, message) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
    let message = message.trim();
    match target.parse::<u8>() {
        Err(_) => CommandOutcome::reply(sender, format!("Invalid car id: '{target}'")),
        Ok(_) if message.is_empty() => {
            CommandOutcome::reply(sender, "Usage: /send_chat <carId> <text>")
        }
        Ok(target) => CommandOutcome::request(Message::SendChat {
            car_id: target,
            message: message.to_string(),
        }),
    }
}
