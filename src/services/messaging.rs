use chrono::Utc;
use log::info;
use serde::Deserialize;
use strum_macros::{AsRefStr, EnumString};

use super::{invalid, Service, ServiceError};
use crate::authorization::{require_any_role, Principal};
use crate::models::{Message, MessageID, Role};
use crate::utils::validation::TextInput;

const PARTIES: &[Role] = &[Role::Patient, Role::Doctor];

#[derive(Debug, Clone, Deserialize)]
pub struct NewMessage {
    /// Username of the recipient
    pub recipient: String,
    pub content: String,
    /// Message this one replies to
    #[serde(default)]
    pub thread: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, EnumString, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mailbox {
    #[default]
    Inbox,
    Sent,
}

/// Flags the recipient may change. Absent flags are left as they are.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageFlags {
    #[serde(default)]
    pub is_read: Option<bool>,
    #[serde(default)]
    pub is_archived: Option<bool>,
}

impl Service {
    pub fn send_message(&self, caller: &Principal, request: &NewMessage) -> Result<Message, ServiceError> {
        require_any_role(caller, PARTIES)?;
        let content = TextInput::new_long_form(&request.content)
            .map_err(invalid("content"))?
            .into_inner();

        let message = self.transaction(|db| {
            let recipient = db
                .lookup_username(request.recipient.trim())
                .map(|user| user.id)
                .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", request.recipient.trim())))?;
            if recipient == caller.user_id {
                return Err(ServiceError::Validation(
                    "recipient: can not send a message to yourself".to_string(),
                ));
            }

            let thread = match request.thread.map(MessageID) {
                None => None,
                Some(id) => {
                    db.get_message(id)
                        .filter(|m| m.involves(caller.user_id))
                        .ok_or_else(|| ServiceError::NotFound(format!("Message {id} not found")))?;
                    Some(id)
                }
            };

            let message = Message {
                id: MessageID(db.next_pk()),
                sender: caller.user_id,
                recipient,
                content,
                timestamp: Utc::now(),
                is_read: false,
                is_archived: false,
                thread,
            };
            db.insert_message(message.clone())?;
            Ok(message)
        })?;

        info!("{} sent message {}", caller.username, message.id);
        Ok(message)
    }

    /// Messages received or sent by the caller, newest first.
    pub fn list_messages(
        &self,
        caller: &Principal,
        mailbox: Mailbox,
        include_archived: bool,
    ) -> Result<Vec<Message>, ServiceError> {
        require_any_role(caller, PARTIES)?;
        let db = self.read()?;

        let mut messages: Vec<Message> = db
            .list_messages()
            .filter(|m| match mailbox {
                Mailbox::Inbox => m.recipient == caller.user_id,
                Mailbox::Sent => m.sender == caller.user_id,
            })
            .filter(|m| include_archived || !m.is_archived)
            .cloned()
            .collect();
        messages.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(messages)
    }

    /// Marks a received message read or archived.
    pub fn update_message(
        &self,
        caller: &Principal,
        message_id: MessageID,
        flags: &MessageFlags,
    ) -> Result<Message, ServiceError> {
        require_any_role(caller, PARTIES)?;

        self.transaction(|db| {
            let message = db
                .get_message_mut(message_id)
                .filter(|m| m.recipient == caller.user_id)
                .ok_or_else(|| ServiceError::NotFound(format!("Message {message_id} not found")))?;

            if let Some(is_read) = flags.is_read {
                message.is_read = is_read;
            }
            if let Some(is_archived) = flags.is_archived {
                message.is_archived = is_archived;
            }
            Ok(message.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::super::test_support::*;
    use super::*;

    fn note(recipient: &str, content: &str) -> NewMessage {
        NewMessage {
            recipient: recipient.to_string(),
            content: content.to_string(),
            thread: None,
        }
    }

    #[test]
    fn test_mailbox_parsing() {
        assert_eq!(Mailbox::from_str("sent").unwrap(), Mailbox::Sent);
        assert_eq!(Mailbox::default(), Mailbox::Inbox);
        assert!(Mailbox::from_str("trash").is_err());
    }

    #[test]
    fn test_messages_reach_the_recipient() {
        let mut ids = None;
        let clinic = clinic_with(|db| {
            let (alice, _) = patient(db, "alice", &[]);
            let (house, _) = doctor(db, "house");
            ids = Some((alice, house));
        });
        let (alice, house) = ids.unwrap();

        let first = clinic.service.send_message(&alice, &note("house", "My throat hurts")).unwrap();
        let mut reply = note("alice", "Come and see me tomorrow");
        reply.thread = Some(first.id.0);
        let second = clinic.service.send_message(&house, &reply).unwrap();
        assert_eq!(second.thread, Some(first.id));

        let inbox = clinic.service.list_messages(&house, Mailbox::Inbox, false).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].content, "My throat hurts");
        assert!(!inbox[0].is_read);

        let sent = clinic.service.list_messages(&house, Mailbox::Sent, false).unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, alice.user_id);
    }

    #[test]
    fn test_inbox_is_newest_first() {
        let mut ids = None;
        let clinic = clinic_with(|db| {
            let (alice, _) = patient(db, "alice", &[]);
            let (house, _) = doctor(db, "house");
            ids = Some((alice, house));
        });
        let (alice, house) = ids.unwrap();

        for content in ["first", "second", "third"] {
            clinic.service.send_message(&alice, &note("house", content)).unwrap();
        }
        let inbox = clinic.service.list_messages(&house, Mailbox::Inbox, false).unwrap();
        let contents: Vec<&str> = inbox.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["third", "second", "first"]);
    }

    #[test]
    fn test_only_the_recipient_flags_a_message() {
        let mut ids = None;
        let clinic = clinic_with(|db| {
            let (alice, _) = patient(db, "alice", &[]);
            let (house, _) = doctor(db, "house");
            ids = Some((alice, house));
        });
        let (alice, house) = ids.unwrap();
        let message = clinic.service.send_message(&alice, &note("house", "Hello")).unwrap();

        let archive = MessageFlags {
            is_read: Some(true),
            is_archived: Some(true),
        };
        assert!(matches!(
            clinic.service.update_message(&alice, message.id, &archive),
            Err(ServiceError::NotFound(_))
        ));

        let updated = clinic.service.update_message(&house, message.id, &archive).unwrap();
        assert!(updated.is_read && updated.is_archived);

        assert!(clinic
            .service
            .list_messages(&house, Mailbox::Inbox, false)
            .unwrap()
            .is_empty());
        assert_eq!(
            clinic.service.list_messages(&house, Mailbox::Inbox, true).unwrap().len(),
            1
        );

        // Absent flags are left alone
        let unread = MessageFlags {
            is_read: Some(false),
            is_archived: None,
        };
        let updated = clinic.service.update_message(&house, message.id, &unread).unwrap();
        assert!(!updated.is_read && updated.is_archived);
    }

    #[test]
    fn test_message_validation() {
        let mut ids = None;
        let clinic = clinic_with(|db| {
            let (alice, _) = patient(db, "alice", &[]);
            let (house, _) = doctor(db, "house");
            let (wilson, _) = doctor(db, "wilson");
            ids = Some((alice, house, wilson));
        });
        let (alice, house, wilson) = ids.unwrap();

        assert!(matches!(
            clinic.service.send_message(&alice, &note("nobody", "Hello")),
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            clinic.service.send_message(&alice, &note("alice", "Hello me")),
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            clinic.service.send_message(&alice, &note("house", "   ")),
            Err(ServiceError::Validation(_))
        ));

        // A thread must involve the sender
        let private = clinic.service.send_message(&alice, &note("house", "Private")).unwrap();
        let mut intrusion = note("alice", "Hi");
        intrusion.thread = Some(private.id.0);
        assert!(matches!(
            clinic.service.send_message(&wilson, &intrusion),
            Err(ServiceError::NotFound(_))
        ));
        assert!(clinic.service.send_message(&house, &intrusion).is_ok());
    }
}
