//! Inbound message classification.
//!
//! Every message from the reasoning system is a JSON object carrying a
//! `type` discriminant. The [`EventClassifier`] reads the discriminant and
//! deserializes the rest of the object into the typed struct of exactly
//! one channel:
//!
//! | `type` | Channel |
//! |--------|---------|
//! | `spike` | [`InboundEvent::Spike`] |
//! | `activation` | [`InboundEvent::Activation`] |
//! | `output`, `input` | [`InboundEvent::Passthrough`] |
//! | `changes`, `triggers`, `emits`, `sets` | [`InboundEvent::StaticLink`] |
//! | `activate` | [`InboundEvent::StateActivated`] |
//! | `signal_spike` | [`InboundEvent::SignalSpiked`] |
//!
//! Anything else is rejected. [`EventClassifier::dispatch`] logs and counts
//! rejected messages and never propagates the error, so one bad message
//! cannot stall the stream. Messages are classified one at a time in
//! arrival order; nothing is buffered.

use serde::de::DeserializeOwned;
use serde_json::Value;
use spikegraph_types::{
    ActivationUpdate, ClassifierStats, PassthroughDirection, PassthroughText, SignalSpiked,
    SpikeUpdate, StateActivated, StaticLink, StaticRelation,
};
use tracing::{debug, warn};

/// Errors that reject an inbound message.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    /// The message is not valid JSON.
    #[error("message is not valid JSON: {source}")]
    InvalidJson {
        /// The underlying parse error.
        source: serde_json::Error,
    },

    /// The message has no string `type` field.
    #[error("message has no string `type` discriminant")]
    MissingType,

    /// The `type` field names no known channel.
    #[error("unknown message type `{type_name}`")]
    UnknownType {
        /// The unrecognised discriminant.
        type_name: String,
    },

    /// A required field for the given type is missing or has the wrong
    /// shape.
    #[error("malformed `{type_name}` message: {source}")]
    Malformed {
        /// The discriminant of the rejected message.
        type_name: String,
        /// The underlying deserialization error.
        source: serde_json::Error,
    },
}

/// A classified inbound message, routed to exactly one channel.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// A spike upsert.
    Spike(SpikeUpdate),
    /// An activation upsert.
    Activation(ActivationUpdate),
    /// A pass-through text message; not part of the graph.
    Passthrough {
        /// Whether the text flows to or from the user.
        direction: PassthroughDirection,
        /// The message text.
        text: String,
    },
    /// A static-mode link descriptor.
    StaticLink(StaticLink),
    /// A static-mode state became active.
    StateActivated(StateActivated),
    /// A static-mode signal spiked.
    SignalSpiked(SignalSpiked),
}

/// Routes raw inbound messages to typed channels and keeps per-channel
/// counters.
#[derive(Debug, Clone, Default)]
pub struct EventClassifier {
    stats: ClassifierStats,
}

impl EventClassifier {
    /// Create a classifier with zeroed counters.
    pub const fn new() -> Self {
        Self {
            stats: ClassifierStats {
                spikes: 0,
                activations: 0,
                passthrough: 0,
                static_links: 0,
                static_events: 0,
                unknown: 0,
                malformed: 0,
            },
        }
    }

    /// Classify a raw JSON message.
    ///
    /// # Errors
    ///
    /// Returns a [`ClassifyError`] describing why the message was rejected.
    pub fn classify(raw: &str) -> Result<InboundEvent, ClassifyError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|source| ClassifyError::InvalidJson { source })?;
        Self::classify_value(value)
    }

    /// Classify an already-parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns a [`ClassifyError`] describing why the message was rejected.
    pub fn classify_value(value: Value) -> Result<InboundEvent, ClassifyError> {
        let type_name = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ClassifyError::MissingType)?
            .to_owned();

        match type_name.as_str() {
            "spike" => parse_body(value, &type_name).map(InboundEvent::Spike),
            "activation" => parse_body(value, &type_name).map(InboundEvent::Activation),
            "output" | "input" => {
                let direction = if type_name == "output" {
                    PassthroughDirection::Output
                } else {
                    PassthroughDirection::Input
                };
                parse_body::<PassthroughText>(value, &type_name).map(|body| {
                    InboundEvent::Passthrough {
                        direction,
                        text: body.text,
                    }
                })
            }
            "activate" => parse_body(value, &type_name).map(InboundEvent::StateActivated),
            "signal_spike" => parse_body(value, &type_name).map(InboundEvent::SignalSpiked),
            other if StaticRelation::from_wire(other).is_some() => {
                parse_body(value, &type_name).map(InboundEvent::StaticLink)
            }
            _ => Err(ClassifyError::UnknownType { type_name }),
        }
    }

    /// Classify a raw message, counting the outcome.
    ///
    /// Rejected messages are logged at `warn` and yield `None`; no error
    /// escapes.
    pub fn dispatch(&mut self, raw: &str) -> Option<InboundEvent> {
        match Self::classify(raw) {
            Ok(event) => {
                self.count(&event);
                debug!(channel = channel_name(&event), "Inbound message classified");
                Some(event)
            }
            Err(err) => {
                if matches!(err, ClassifyError::UnknownType { .. }) {
                    self.stats.unknown = self.stats.unknown.saturating_add(1);
                } else {
                    self.stats.malformed = self.stats.malformed.saturating_add(1);
                }
                warn!(error = %err, "Dropping inbound message");
                None
            }
        }
    }

    /// Return the per-channel counters.
    pub const fn stats(&self) -> ClassifierStats {
        self.stats
    }

    fn count(&mut self, event: &InboundEvent) {
        let counter = match event {
            InboundEvent::Spike(_) => &mut self.stats.spikes,
            InboundEvent::Activation(_) => &mut self.stats.activations,
            InboundEvent::Passthrough { .. } => &mut self.stats.passthrough,
            InboundEvent::StaticLink(_) => &mut self.stats.static_links,
            InboundEvent::StateActivated(_) | InboundEvent::SignalSpiked(_) => {
                &mut self.stats.static_events
            }
        };
        *counter = counter.saturating_add(1);
    }
}

/// Deserialize the body of a message whose discriminant is `type_name`.
fn parse_body<T: DeserializeOwned>(value: Value, type_name: &str) -> Result<T, ClassifyError> {
    serde_json::from_value(value).map_err(|source| ClassifyError::Malformed {
        type_name: type_name.to_owned(),
        source,
    })
}

const fn channel_name(event: &InboundEvent) -> &'static str {
    match event {
        InboundEvent::Spike(_) => "spike",
        InboundEvent::Activation(_) => "activation",
        InboundEvent::Passthrough { .. } => "passthrough",
        InboundEvent::StaticLink(_) => "static_link",
        InboundEvent::StateActivated(_) => "state_activated",
        InboundEvent::SignalSpiked(_) => "signal_spiked",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use spikegraph_types::{ActivationId, ActivationStatus, SpikeId};

    use super::*;

    #[test]
    fn routes_spike() {
        let event = EventClassifier::classify(
            r#"{"type": "spike", "id": 0, "signal": "rawio:in:changed", "parents": []}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            InboundEvent::Spike(SpikeUpdate {
                id: SpikeId::new(0),
                signal: String::from("rawio:in:changed"),
                parents: Vec::new(),
            })
        );
    }

    #[test]
    fn routes_activation() {
        let event = EventClassifier::classify(
            r#"{"type": "activation", "id": 1, "state": "nlp", "specificity": 0.2,
                "status": "run", "spikes": [{"rawio:in:changed": 0}]}"#,
        )
        .unwrap();
        assert!(matches!(
            event,
            InboundEvent::Activation(ref update)
                if update.id == ActivationId::new(1) && update.status == ActivationStatus::Run
        ));
    }

    #[test]
    fn routes_output_and_input_to_passthrough() {
        let output = EventClassifier::classify(r#"{"type": "output", "text": "hi"}"#).unwrap();
        assert_eq!(
            output,
            InboundEvent::Passthrough {
                direction: PassthroughDirection::Output,
                text: String::from("hi"),
            }
        );
        let input = EventClassifier::classify(r#"{"type": "input", "text": "yo"}"#).unwrap();
        assert!(matches!(
            input,
            InboundEvent::Passthrough {
                direction: PassthroughDirection::Input,
                ..
            }
        ));
    }

    #[test]
    fn routes_static_link() {
        let event = EventClassifier::classify(
            r#"{"source": "nlp", "target": "is-question", "type": "emits"}"#,
        )
        .unwrap();
        assert!(matches!(event, InboundEvent::StaticLink(ref link) if link.relation == StaticRelation::Emits));
    }

    #[test]
    fn routes_static_activate_and_signal_spike() {
        let mut classifier = EventClassifier::new();
        let activated = classifier
            .dispatch(r#"{"type": "activate", "state": "wildtalk"}"#)
            .unwrap();
        assert_eq!(
            activated,
            InboundEvent::StateActivated(StateActivated {
                state: String::from("wildtalk"),
            })
        );
        let spiked = classifier
            .dispatch(r#"{"type": "signal_spike", "signal": "is-question"}"#)
            .unwrap();
        assert!(matches!(spiked, InboundEvent::SignalSpiked(ref s) if s.signal == "is-question"));
        assert!(classifier.dispatch(r#"{"type": "activate"}"#).is_none());

        let stats = classifier.stats();
        assert_eq!(stats.static_events, 2);
        assert_eq!(stats.malformed, 1);
    }

    #[test]
    fn missing_type_is_rejected() {
        let result = EventClassifier::classify(r#"{"id": 1, "signal": "x", "parents": []}"#);
        assert!(matches!(result, Err(ClassifyError::MissingType)));

        let result = EventClassifier::classify(r#"{"type": 5}"#);
        assert!(matches!(result, Err(ClassifyError::MissingType)));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let result = EventClassifier::classify(r#"{"type": "tick", "activations": []}"#);
        assert!(matches!(
            result,
            Err(ClassifyError::UnknownType { ref type_name }) if type_name == "tick"
        ));
    }

    #[test]
    fn missing_required_field_is_malformed() {
        let result = EventClassifier::classify(r#"{"type": "spike", "id": 1, "signal": "x"}"#);
        assert!(matches!(result, Err(ClassifyError::Malformed { .. })));

        let result = EventClassifier::classify(
            r#"{"type": "activation", "id": 1, "state": "s", "specificity": 1.0,
                "status": "sleeping", "spikes": []}"#,
        );
        assert!(matches!(result, Err(ClassifyError::Malformed { .. })));
    }

    #[test]
    fn invalid_json_is_rejected() {
        let result = EventClassifier::classify("{not json");
        assert!(matches!(result, Err(ClassifyError::InvalidJson { .. })));
    }

    #[test]
    fn dispatch_counts_and_drops() {
        let mut classifier = EventClassifier::new();
        assert!(classifier
            .dispatch(r#"{"type": "spike", "id": 0, "signal": "a", "parents": []}"#)
            .is_some());
        assert!(classifier.dispatch(r#"{"type": "output", "text": "x"}"#).is_some());
        assert!(classifier.dispatch(r#"{"type": "bogus"}"#).is_none());
        assert!(classifier.dispatch(r#"{"type": "spike"}"#).is_none());
        assert!(classifier.dispatch("").is_none());

        let stats = classifier.stats();
        assert_eq!(stats.spikes, 1);
        assert_eq!(stats.passthrough, 1);
        assert_eq!(stats.unknown, 1);
        assert_eq!(stats.malformed, 2);
    }
}
