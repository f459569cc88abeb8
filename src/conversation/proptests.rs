//! Property-based tests for the message store
//!
//! Any sequence of appends, removals and branch operations must leave:
//! - exactly one system message, at index 0
//! - a restored branch equal to the messages at the time it was saved

use super::Conversation;
use crate::llm::{Message, Role};
use crate::runtime::testing::TestHarness;
use crate::session::{AgentRole, Session};
use proptest::prelude::*;
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum Op {
    User(String),
    Assistant(String),
    System(String),
    TruncateLast(usize),
    Save(String),
    Restore(String),
}

fn arb_branch_name() -> impl Strategy<Value = String> {
    prop_oneof![Just("a".to_string()), Just("b".to_string()), Just("c".to_string())]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => "[a-z ]{0,20}".prop_map(Op::User),
        3 => "[a-z ]{0,20}".prop_map(Op::Assistant),
        1 => "[a-z ]{0,20}".prop_map(Op::System),
        2 => (0usize..6).prop_map(Op::TruncateLast),
        2 => arb_branch_name().prop_map(Op::Save),
        2 => arb_branch_name().prop_map(Op::Restore),
    ]
}

fn assert_single_leading_system(messages: &[Message]) -> Result<(), TestCaseError> {
    prop_assert!(!messages.is_empty());
    prop_assert_eq!(messages[0].role, Role::System);
    prop_assert_eq!(
        messages.iter().filter(|m| m.role == Role::System).count(),
        1
    );
    Ok(())
}

proptest! {
    #[test]
    fn prop_message_store_invariants(ops in prop::collection::vec(arb_op(), 0..40)) {
        let harness = TestHarness::new();
        let session = Session::new("proj", "coding");
        let mut convo = Conversation::new(AgentRole::Developer, &session, harness.deps.clone())
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let mut saved: HashMap<String, Vec<Message>> = HashMap::new();

        for op in ops {
            match op {
                Op::User(text) => {
                    prop_assert!(convo.append(Message::user(text)).is_ok());
                }
                Op::Assistant(text) => {
                    prop_assert!(convo.append(Message::assistant(text)).is_ok());
                }
                Op::System(text) => {
                    prop_assert!(convo.append(Message::system(text)).is_err());
                }
                Op::TruncateLast(x) => {
                    let before = convo.messages().len();
                    convo.truncate_last(x);
                    prop_assert_eq!(convo.messages().len(), before.saturating_sub(x).max(1));
                }
                Op::Save(name) => {
                    convo.save_branch(name.clone());
                    saved.insert(name, convo.messages().to_vec());
                }
                Op::Restore(name) => {
                    let result = convo.restore_branch(&name);
                    match saved.get(&name) {
                        Some(snapshot) => {
                            prop_assert!(result.is_ok());
                            prop_assert_eq!(convo.messages(), snapshot.as_slice());
                        }
                        None => prop_assert!(result.is_err()),
                    }
                }
            }
            assert_single_leading_system(convo.messages())?;
            prop_assert_eq!(convo.active_length(), convo.messages().len() - 1);
        }
    }
}
