use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use utoipa::ToSchema;

pub mod logging;

// ============================================================================
// Core Pipeline Types
// ============================================================================

/// Constant action tag carried by every forwarding outcome record.
pub const ACTION_SIGNAL_FORWARDED: &str = "signal_forwarded";

/// Provenance of a raw message.
///
/// Closed set so downstream dispatch is exhaustive; serialized snake_case to
/// match the wire values the queue store already carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Live ingestion from the chat source client
    TelegramReceiver,
    /// Diagnostic injection via the gateway's /test/signal endpoint
    TestInjection,
    /// Test fixtures
    Test,
}

/// A normalized inbound chat message, produced by the ingestion stage and
/// consumed exactly once by the parsing stage.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RawMessage {
    pub text: String,
    pub chat_id: i64,
    pub message_id: i64,
    pub sender_id: i64,
    pub timestamp: DateTime<Utc>,
    pub source: SourceKind,
}

/// Classification of a parsed signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Complete entry signal with symbol, entry price and targets
    FullSignal,
    /// Progress/result update for an already-published signal
    TradingUpdate,
}

/// Trade direction extracted from a full signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

/// Structured fields extracted from a full signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ParsedSignalData {
    pub direction: Direction,
    pub symbol: String,
    pub leverage: f64,
    pub entry_price: f64,
    pub targets: Vec<f64>,
}

/// A signal ready for delivery, produced by the parsing stage and consumed
/// exactly once by the forwarding stage.
///
/// `metadata` carries the originating [`RawMessage`] (including its
/// timestamp) as an opaque JSON value.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ParsedSignal {
    #[serde(rename = "type")]
    pub kind: SignalKind,
    pub original_text: String,
    pub formatted_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed_data: Option<ParsedSignalData>,
    pub source_chat_id: i64,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
}

impl ParsedSignal {
    /// Original receipt timestamp, read back out of the metadata.
    pub fn original_timestamp(&self) -> Option<String> {
        self.metadata
            .get("timestamp")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }
}

/// Append-only record of one forwarding attempt sequence.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ForwardingOutcome {
    pub action: String,
    #[serde(rename = "type")]
    pub kind: SignalKind,
    pub source_chat_id: i64,
    pub target_chat_id: i64,
    pub timestamp: Option<String>,
    pub success: bool,
}

impl ForwardingOutcome {
    pub fn new(signal: &ParsedSignal, target_chat_id: i64, success: bool) -> Self {
        Self {
            action: ACTION_SIGNAL_FORWARDED.to_string(),
            kind: signal.kind,
            source_chat_id: signal.source_chat_id,
            target_chat_id,
            timestamp: signal.original_timestamp(),
            success,
        }
    }
}

// ============================================================================
// Cooperative Shutdown
// ============================================================================

/// Shared stop flag for the single-loop stages.
///
/// Loops check it after every timeout-bounded wait, so a stop request is
/// honored within one poll interval.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_signal() -> ParsedSignal {
        let raw = RawMessage {
            text: "BUY BTCUSDT 0.1".to_string(),
            chat_id: -1002299206473,
            message_id: 1,
            sender_id: 1,
            timestamp: "2025-08-24T12:00:00Z".parse().unwrap(),
            source: SourceKind::Test,
        };
        ParsedSignal {
            kind: SignalKind::TradingUpdate,
            original_text: raw.text.clone(),
            formatted_text: raw.text.clone(),
            parsed_data: None,
            source_chat_id: raw.chat_id,
            metadata: serde_json::to_value(&raw).unwrap(),
        }
    }

    #[test]
    fn source_kind_wire_values() {
        let json = serde_json::to_string(&SourceKind::TelegramReceiver).unwrap();
        assert_eq!(json, "\"telegram_receiver\"");
        let back: SourceKind = serde_json::from_str("\"test_injection\"").unwrap();
        assert_eq!(back, SourceKind::TestInjection);
    }

    #[test]
    fn signal_kind_uses_type_field() {
        let signal = sample_signal();
        let value = serde_json::to_value(&signal).unwrap();
        assert_eq!(value["type"], "trading_update");
    }

    #[test]
    fn outcome_carries_original_timestamp() {
        let signal = sample_signal();
        let outcome = ForwardingOutcome::new(&signal, -1002773853382, true);
        assert_eq!(outcome.action, ACTION_SIGNAL_FORWARDED);
        assert_eq!(outcome.source_chat_id, -1002299206473);
        assert_eq!(outcome.timestamp.as_deref(), Some("2025-08-24T12:00:00+00:00"));
        assert!(outcome.success);
    }

    #[test]
    fn shutdown_flag_round_trip() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_stopped());
        shutdown.stop();
        assert!(shutdown.is_stopped());
    }
}
