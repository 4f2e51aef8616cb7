//! Client-side conversation state.
//!
//! [`Chat`] is a plain state machine: it never touches the network. Whatever drives the
//! transport hands it the raw bytes of the relay response through [`Chat::apply`], tagged with
//! the generation returned by [`Chat::submit`].

use crate::data_stream::{Decoder, StreamPart};
use crate::error::Error;
use crate::message::{Message, Role};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    #[default]
    Idle,
    Submitting,
    Streaming,
    Errored,
}

/// What happened to the transport of a submitted conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(Vec<u8>),
    End,
    Failed(String),
}

/// A change the renderer should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// Text appended to the last assistant message.
    Appended(String),
    Finished,
    Failed(String),
}

/// The conversation to send to the relay for a new submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub generation: u64,
    pub messages: Vec<Message>,
}

#[derive(Debug, Default)]
pub struct Chat {
    messages: Vec<Message>,
    input: String,
    loading: bool,
    error: Option<String>,
    status: Status,
    generation: u64,
    decoder: Decoder,
}

impl Chat {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The assistant message currently receiving fragments, if any.
    pub fn in_progress(&self) -> Option<&Message> {
        if self.loading {
            self.messages.last()
        } else {
            None
        }
    }

    /// Starts a new exchange with the current input.
    ///
    /// Returns `None` without touching any state when the input is blank. A stream that is still
    /// active is cancelled: its placeholder keeps whatever text arrived and is marked incomplete.
    pub fn submit(&mut self) -> Option<Submission> {
        if self.input.trim().is_empty() {
            return None;
        }

        if self.loading {
            log::debug!("cancelling stream of generation {}", self.generation);
            self.mark_incomplete();
        }

        self.error = None;
        self.messages
            .push(Message::user(std::mem::take(&mut self.input)));
        self.loading = true;
        self.status = Status::Submitting;
        self.generation += 1;
        self.decoder = Decoder::new();

        let messages = self
            .messages
            .iter()
            .filter(|m| !(m.role == Role::Assistant && m.content.is_empty()))
            .cloned()
            .collect();

        self.messages.push(Message::assistant(""));

        Some(Submission {
            generation: self.generation,
            messages,
        })
    }

    /// Applies a transport event for the exchange started at `generation`.
    ///
    /// Events from an older generation, or arriving once the exchange is over, are dropped.
    pub fn apply(&mut self, generation: u64, event: StreamEvent) -> Option<Update> {
        if generation != self.generation || !self.loading {
            log::debug!(
                "ignoring event for generation {} (current {}, loading {})",
                generation,
                self.generation,
                self.loading
            );
            return None;
        }

        match event {
            StreamEvent::Chunk(bytes) => {
                self.status = Status::Streaming;

                let mut parts = Vec::new();
                let decoded = self.decoder.push_into(&bytes, &mut parts);
                let update = self.apply_parts(parts);

                match decoded {
                    Err(e) if self.loading => Some(self.fail(e.to_string())),
                    _ => update,
                }
            }
            // Still loading here means the finish marker never arrived.
            StreamEvent::End => {
                let description = match self.decoder.finish() {
                    Ok(_) => Error::Truncated.to_string(),
                    Err(e) => e.to_string(),
                };
                Some(self.fail(description))
            }
            StreamEvent::Failed(description) => Some(self.fail(description)),
        }
    }

    fn apply_parts(&mut self, parts: Vec<StreamPart>) -> Option<Update> {
        let mut appended = String::new();

        for part in parts {
            match part {
                StreamPart::Text(text) => {
                    appended.push_str(&text);
                    self.append(&text);
                }
                StreamPart::Error(description) => return Some(self.fail(description)),
                StreamPart::FinishMessage(_) => {
                    self.loading = false;
                    self.status = Status::Idle;
                    return Some(Update::Finished);
                }
                StreamPart::StartStep(_) | StreamPart::FinishStep(_) => {}
            }
        }

        if appended.is_empty() {
            None
        } else {
            Some(Update::Appended(appended))
        }
    }

    fn append(&mut self, text: &str) {
        if let Some(message) = self.messages.last_mut() {
            message.content.push_str(text);
        }
    }

    fn mark_incomplete(&mut self) {
        if let Some(message) = self.messages.last_mut() {
            if message.role == Role::Assistant {
                message.incomplete = true;
            }
        }
    }

    fn fail(&mut self, description: String) -> Update {
        self.mark_incomplete();
        self.loading = false;
        self.status = Status::Errored;
        self.error = Some(description.clone());
        Update::Failed(description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_stream::{FinishMessage, FinishStep, StartStep};

    fn chunk(parts: &[StreamPart]) -> StreamEvent {
        StreamEvent::Chunk(
            parts
                .iter()
                .map(ToString::to_string)
                .collect::<String>()
                .into_bytes(),
        )
    }

    fn text(text: &str) -> StreamPart {
        StreamPart::Text(text.to_string())
    }

    fn finish() -> Vec<StreamPart> {
        vec![
            StreamPart::FinishStep(FinishStep::default()),
            StreamPart::FinishMessage(FinishMessage::default()),
        ]
    }

    fn submit(chat: &mut Chat, input: &str) -> Submission {
        chat.set_input(input);
        match chat.submit() {
            Some(submission) => submission,
            None => panic!("submit of {input:?} was a no-op"),
        }
    }

    #[test]
    fn test_blank_submit_is_a_noop() {
        let mut chat = Chat::new();

        for input in ["", "  \n\t"] {
            chat.set_input(input);
            assert_eq!(chat.submit(), None);
            assert!(chat.messages().is_empty());
            assert!(!chat.loading());
            assert_eq!(chat.error(), None);
            assert_eq!(chat.status(), Status::Idle);
            assert_eq!(chat.input(), input, "input should be left untouched");
        }
    }

    #[test]
    fn test_submit_appends_user_message_and_placeholder() {
        let mut chat = Chat::new();

        let submission = submit(&mut chat, "2+2?");

        assert_eq!(submission.generation, 1);
        assert_eq!(submission.messages, vec![Message::user("2+2?")]);
        assert_eq!(
            chat.messages(),
            &[Message::user("2+2?"), Message::assistant("")]
        );
        assert_eq!(chat.input(), "");
        assert!(chat.loading());
        assert_eq!(chat.status(), Status::Submitting);
        assert_eq!(chat.in_progress(), Some(&Message::assistant("")));
    }

    #[test]
    fn test_two_plus_two() {
        let mut chat = Chat::new();
        let submission = submit(&mut chat, "2+2?");
        let generation = submission.generation;

        let start = StreamPart::StartStep(StartStep {
            message_id: "msg-1".to_string(),
        });
        assert_eq!(
            chat.apply(generation, chunk(&[start, text("4")])),
            Some(Update::Appended("4".to_string()))
        );
        assert!(chat.loading());
        assert_eq!(chat.status(), Status::Streaming);

        assert_eq!(chat.apply(generation, chunk(&finish())), Some(Update::Finished));
        assert_eq!(chat.apply(generation, StreamEvent::End), None);

        assert_eq!(
            chat.messages(),
            &[Message::user("2+2?"), Message::assistant("4")]
        );
        assert!(!chat.loading());
        assert_eq!(chat.error(), None);
        assert_eq!(chat.status(), Status::Idle);
        assert_eq!(chat.in_progress(), None);
    }

    #[test]
    fn test_reply_is_the_concatenation_of_fragments() {
        for fragments in [vec!["Hel", "lo, wo", "rld"], vec!["H", "ello, world"]] {
            let mut chat = Chat::new();
            let generation = submit(&mut chat, "greet me").generation;

            for fragment in &fragments {
                chat.apply(generation, chunk(&[text(fragment)]));
            }
            chat.apply(generation, chunk(&finish()));

            assert_eq!(chat.messages()[1].content, "Hello, world");
            assert!(!chat.messages()[1].incomplete);
        }
    }

    #[test]
    fn test_chunks_split_inside_a_character() {
        let mut bytes = [text("¡hola "), text("señor!")]
            .iter()
            .map(ToString::to_string)
            .collect::<String>()
            .into_bytes();
        bytes.extend(
            finish()
                .iter()
                .map(ToString::to_string)
                .collect::<String>()
                .into_bytes(),
        );

        let mut chat = Chat::new();
        let generation = submit(&mut chat, "hi").generation;

        for piece in bytes.chunks(3) {
            chat.apply(generation, StreamEvent::Chunk(piece.to_vec()));
        }

        assert_eq!(chat.messages()[1].content, "¡hola señor!");
        assert_eq!(chat.status(), Status::Idle);
    }

    #[test]
    fn test_stream_without_finish_marker_is_truncated() {
        let mut chat = Chat::new();
        let generation = submit(&mut chat, "hi").generation;

        chat.apply(generation, chunk(&[text("Hel")]));
        let update = chat.apply(generation, StreamEvent::End);

        assert_eq!(update, Some(Update::Failed(Error::Truncated.to_string())));
        assert!(!chat.loading());
        assert_eq!(chat.status(), Status::Errored);
        assert_eq!(chat.messages()[1].content, "Hel");
        assert!(chat.messages()[1].incomplete);
    }

    #[test]
    fn test_error_part_keeps_partial_text() {
        let mut chat = Chat::new();
        let generation = submit(&mut chat, "hi").generation;

        let update = chat.apply(
            generation,
            chunk(&[text("par"), text("tial"), StreamPart::Error("provider went away".to_string())]),
        );

        assert_eq!(update, Some(Update::Failed("provider went away".to_string())));
        assert_eq!(chat.error(), Some("provider went away"));
        assert_eq!(chat.messages()[1].content, "partial");
        assert!(chat.messages()[1].incomplete);
        assert!(!chat.loading());
    }

    #[test]
    fn test_decode_error_is_a_failure() {
        let mut chat = Chat::new();
        let generation = submit(&mut chat, "hi").generation;

        let update = chat.apply(generation, StreamEvent::Chunk(b"0:\"\xc3\x28\"\n".to_vec()));

        assert!(matches!(update, Some(Update::Failed(_))), "got {update:?}");
        assert_eq!(chat.status(), Status::Errored);
        assert!(chat.error().is_some());
    }

    #[test]
    fn test_decode_error_keeps_text_decoded_before_it() {
        let bytes = b"0:\"Hel\"\n0:\"\xff\"\n";

        for split in [bytes.len(), 8] {
            let mut chat = Chat::new();
            let generation = submit(&mut chat, "hi").generation;

            chat.apply(generation, StreamEvent::Chunk(bytes[..split].to_vec()));
            chat.apply(generation, StreamEvent::Chunk(bytes[split..].to_vec()));

            assert_eq!(chat.messages()[1].content, "Hel", "split at byte {split}");
            assert!(chat.messages()[1].incomplete, "split at byte {split}");
            assert_eq!(chat.status(), Status::Errored, "split at byte {split}");
            assert!(chat.error().is_some(), "split at byte {split}");
        }
    }

    #[test]
    fn test_transport_failure_before_any_text() {
        let mut chat = Chat::new();
        let generation = submit(&mut chat, "hi").generation;

        chat.apply(generation, StreamEvent::Failed("connection refused".to_string()));

        assert_eq!(chat.error(), Some("connection refused"));
        assert!(!chat.loading());
        assert_eq!(chat.messages().len(), 2, "no message is dropped");
        assert!(chat.messages()[1].incomplete);
    }

    #[test]
    fn test_next_submit_clears_the_error() {
        let mut chat = Chat::new();
        let generation = submit(&mut chat, "first").generation;
        chat.apply(generation, StreamEvent::Failed("boom".to_string()));

        let submission = submit(&mut chat, "second");

        assert_eq!(chat.error(), None);
        assert!(chat.loading());
        assert_eq!(
            submission.messages,
            vec![Message::user("first"), Message::user("second")],
            "empty placeholders are not sent upstream"
        );

        chat.apply(submission.generation, chunk(&[text("ok")]));
        chat.apply(submission.generation, chunk(&finish()));
        assert_eq!(chat.error(), None);
        assert_eq!(chat.messages().len(), 4);
    }

    #[test]
    fn test_history_is_sent_in_order() {
        let mut chat = Chat::new();
        let first = submit(&mut chat, "one").generation;
        chat.apply(first, chunk(&[text("uno")]));
        chat.apply(first, chunk(&finish()));

        let second = submit(&mut chat, "two");

        assert_eq!(
            second.messages,
            vec![
                Message::user("one"),
                Message::assistant("uno"),
                Message::user("two")
            ]
        );
    }

    #[test]
    fn test_new_submit_cancels_the_active_stream() {
        let mut chat = Chat::new();
        let first = submit(&mut chat, "slow").generation;
        chat.apply(first, chunk(&[text("partial")]));

        let second = submit(&mut chat, "fast");

        assert_eq!(
            second.messages,
            vec![
                Message::user("slow"),
                Message::assistant("partial"),
                Message::user("fast")
            ]
        );

        assert_eq!(chat.apply(first, chunk(&[text(" late")])), None);
        assert_eq!(chat.apply(first, StreamEvent::Failed("aborted".to_string())), None);

        chat.apply(second.generation, chunk(&[text("done")]));
        chat.apply(second.generation, chunk(&finish()));

        let roles: Vec<Role> = chat.messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        assert_eq!(chat.messages()[1].content, "partial");
        assert!(chat.messages()[1].incomplete);
        assert_eq!(chat.messages()[3].content, "done");
        assert!(!chat.messages()[3].incomplete);
        assert_eq!(chat.error(), None);
        assert!(!chat.loading());
    }

    #[test]
    fn test_loading_spans_submit_to_termination() {
        let mut chat = Chat::new();
        assert!(!chat.loading());

        let generation = submit(&mut chat, "hi").generation;
        assert!(chat.loading());

        chat.apply(generation, chunk(&[text("a")]));
        assert!(chat.loading());
        chat.apply(generation, StreamEvent::Chunk(Vec::new()));
        assert!(chat.loading());

        chat.apply(generation, chunk(&finish()));
        assert!(!chat.loading());

        assert_eq!(chat.apply(generation, chunk(&[text("b")])), None);
        assert_eq!(chat.messages()[1].content, "a");
    }
}
