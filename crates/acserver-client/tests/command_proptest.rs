//! Property-based tests for admin chat command handling.

use openracing_acserver_client::CommandProcessor;
use openracing_acserver_protocol::{Message, encode};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Ordinary chat is never treated as a command.
    #[test]
    fn prop_plain_chat_passes_through(
        car_id in any::<u8>(),
        text in "[a-zA-Z0-9][^\n]{0,120}",
        is_admin in any::<bool>(),
    ) {
        let processor = CommandProcessor::new("secret");
        prop_assert!(processor.process(car_id, &text, is_admin).is_none());
    }

    /// Without admin rights, an admin command only ever produces a reply to
    /// the sender.
    #[test]
    fn prop_unauthenticated_commands_only_reply(
        car_id in any::<u8>(),
        command in prop_oneof![
            Just("/send_chat"),
            Just("/broadcast"),
            Just("/kick"),
            Just("/next_session"),
            Just("/restart_session"),
        ],
        args in "[ -~]{0,40}",
    ) {
        let processor = CommandProcessor::new("secret");
        let outcome = processor.process(car_id, &format!("{command} {args}"), false);
        let outcome = outcome.ok_or_else(|| TestCaseError::fail("command not recognised"))?;
        prop_assert!(!outcome.grant_admin);
        for request in &outcome.requests {
            let is_reply_to_sender = matches!(request, Message::SendChat { car_id: to, .. } if *to == car_id);
            prop_assert!(is_reply_to_sender);
        }
    }

    /// Whatever an admin types, the resulting requests fit on the wire.
    #[test]
    fn prop_admin_requests_are_encodable(
        car_id in any::<u8>(),
        text in "/[a-z_]{1,16}( [ -~]{0,200})?",
    ) {
        let processor = CommandProcessor::new("secret");
        if let Some(outcome) = processor.process(car_id, &text, true) {
            for request in &outcome.requests {
                prop_assert!(matches!(encode(request), Ok(_)));
            }
        }
    }
}
