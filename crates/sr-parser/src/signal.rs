//! Signal detection, extraction and rendering
//!
//! Recognizes two message shapes from the monitored groups: complete entry
//! signals (direction, symbol, leverage, entry price, target ladder) and
//! shorter trading updates (target hit, running profit). Anything else is
//! not a signal.

use regex::Regex;
use tracing::debug;

use sr_common::{Direction, ParsedSignalData};

pub struct SignalDetector {
    name_re: Regex,
    leverage_re: Regex,
    target_re: Regex,
    update_symbol_re: Regex,
    command_re: Regex,
}

impl Default for SignalDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalDetector {
    pub fn new() -> Self {
        Self {
            name_re: Regex::new(r"Name:\s*([A-Z0-9]+/[A-Z]+)").expect("invalid name pattern"),
            leverage_re: Regex::new(r"\(([0-9.]+)X\)").expect("invalid leverage pattern"),
            target_re: Regex::new(r"\d+\)\s*([0-9.]+)").expect("invalid target pattern"),
            update_symbol_re: Regex::new(r"[A-Z0-9]{2,8}/USDT").expect("invalid symbol pattern"),
            command_re: Regex::new(r"\b(?:BUY|SELL|LONG|SHORT)\s+[A-Z0-9]{2,12}\b")
                .expect("invalid command pattern"),
        }
    }

    /// Whether the text is a signal at all: either a complete entry signal
    /// or one of the known trading-update shapes.
    pub fn is_signal(&self, text: &str) -> bool {
        let is_full_signal = (text.contains("🟢 Long") || text.contains("🟢 Short"))
            && text.contains("Name:")
            && text.contains("Margin mode:")
            && text.contains("Entry price(USDT):")
            && text.contains("Targets(USDT):");

        if is_full_signal {
            return true;
        }

        let upper = text.to_uppercase();
        (text.contains("💸") && text.contains("/USDT"))
            || (text.contains("Target #") && text.contains("Done"))
            || (text.contains("Current profit:") && text.contains('%'))
            || (text.contains("/USDT")
                && ["LONG", "SHORT", "BUY", "SELL"].iter().any(|kw| upper.contains(kw)))
            || self.update_symbol_re.is_match(text)
            || self.command_re.is_match(text)
    }

    /// Trading updates are forwarded verbatim instead of re-rendered.
    pub fn is_trading_update(&self, text: &str) -> bool {
        (text.contains("💸") && text.contains("/USDT"))
            || (text.contains("Target #") && text.contains("Done"))
            || self.command_re.is_match(text)
    }

    /// Extract the structured fields of a complete entry signal. Returns
    /// `None` unless direction, symbol and entry price are all present.
    pub fn parse_signal(&self, text: &str) -> Option<ParsedSignalData> {
        let lines: Vec<&str> = text.lines().collect();

        let mut direction = None;
        let mut symbol = None;
        let mut leverage = None;
        let mut entry_price = None;
        let mut targets = Vec::new();

        let mut i = 0;
        while i < lines.len() {
            let line = lines[i].trim();

            if line.contains("🟢 Long") {
                direction = Some(Direction::Long);
            } else if line.contains("🟢 Short") || line.contains("🔴 Short") {
                direction = Some(Direction::Short);
            } else if line.starts_with("Name:") {
                if let Some(captures) = self.name_re.captures(line) {
                    symbol = Some(captures[1].to_string());
                }
            } else if line.contains("Margin mode:") && line.contains("Cross") {
                if let Some(captures) = self.leverage_re.captures(line) {
                    leverage = captures[1].parse::<f64>().ok();
                }
            } else if line.contains("Entry price(USDT):") {
                if let Some(price_line) = lines.get(i + 1) {
                    entry_price = price_line.trim().parse::<f64>().ok();
                }
            } else if line.contains("Targets(USDT):") {
                let mut j = i + 1;
                while let Some(target_line) = lines.get(j) {
                    match self.target_re.captures(target_line.trim()) {
                        Some(captures) => {
                            if let Ok(target) = captures[1].parse::<f64>() {
                                targets.push(target);
                            }
                            j += 1;
                        }
                        None => break,
                    }
                }
            }

            i += 1;
        }

        match (direction, symbol, entry_price) {
            (Some(direction), Some(symbol), Some(entry_price)) => Some(ParsedSignalData {
                direction,
                symbol,
                leverage: leverage.unwrap_or(1.0),
                entry_price,
                targets,
            }),
            _ => {
                debug!("incomplete signal, dropping");
                None
            }
        }
    }
}

/// Render a parsed signal in the canonical outbound format.
pub fn format_signal(data: &ParsedSignalData) -> String {
    let emoji = match data.direction {
        Direction::Long => "🟢",
        Direction::Short => "🔴",
    };

    let mut formatted = format!(
        "{emoji} {direction}\nName: {symbol}\nMargin mode: Cross ({leverage:.1}X)\n\n↪️ Entry price(USDT):\n{entry}\n\nTargets(USDT):",
        direction = data.direction,
        symbol = data.symbol,
        leverage = data.leverage,
        entry = data.entry_price,
    );

    for (i, target) in data.targets.iter().enumerate() {
        formatted.push_str(&format!("\n{}) {}", i + 1, target));
    }

    formatted
}
