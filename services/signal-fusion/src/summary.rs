//! One-line call summary for the chat transport
//!
//! `<symbol> <direction> <confidence>% (<grade>) targets=<t1>/<t2>/<t3> SL=<sl> RR=1:<rr>`

use serde::{Deserialize, Serialize};

use crate::types::{Direction, Grade, TradingCall};

/// Decimals kept when printing levels
const SUMMARY_DECIMALS: usize = 6;

/// Fields recovered from a summary line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedSummary {
    pub symbol: String,
    pub direction: Direction,
    pub confidence: f64,
    pub grade: Grade,
    pub target1: f64,
    pub target2: f64,
    pub target3: f64,
    pub stop_loss: f64,
    pub risk_reward: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum SummaryError {
    #[error("Malformed summary: {0}")]
    Malformed(String),

    #[error("Invalid number in {field}: {value}")]
    InvalidNumber { field: &'static str, value: String },
}

/// Render a call as a single summary line
pub fn format_summary(call: &TradingCall) -> String {
    let t = &call.targets;
    format!(
        "{} {} {}% ({}) targets={}/{}/{} SL={} RR=1:{}",
        call.symbol,
        call.direction,
        format_number(call.final_confidence),
        call.grade,
        format_number(t.target1),
        format_number(t.target2),
        format_number(t.target3),
        format_number(t.stop_loss),
        format_number(t.risk_reward),
    )
}

/// Up to six decimals, trailing zeros trimmed
pub fn format_number(value: f64) -> String {
    let s = format!("{:.*}", SUMMARY_DECIMALS, value);
    let trimmed = if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s.as_str()
    };
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Parse a line produced by [`format_summary`]
pub fn parse_summary(line: &str) -> Result<ParsedSummary, SummaryError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let [symbol, direction, confidence, grade, targets, stop, rr] = tokens.as_slice() else {
        return Err(SummaryError::Malformed(format!(
            "expected 7 fields, found {}",
            tokens.len()
        )));
    };

    let direction = Direction::parse(direction)
        .ok_or_else(|| SummaryError::Malformed(format!("unknown direction {}", direction)))?;

    let confidence = confidence
        .strip_suffix('%')
        .ok_or_else(|| SummaryError::Malformed("confidence missing %".to_string()))?;
    let confidence = parse_number("confidence", confidence)?;

    let grade = grade
        .strip_prefix('(')
        .and_then(|g| g.strip_suffix(')'))
        .and_then(Grade::parse)
        .ok_or_else(|| SummaryError::Malformed(format!("unknown grade {}", grade)))?;

    let targets = targets
        .strip_prefix("targets=")
        .ok_or_else(|| SummaryError::Malformed("missing targets=".to_string()))?;
    let levels: Vec<&str> = targets.split('/').collect();
    let [t1, t2, t3] = levels.as_slice() else {
        return Err(SummaryError::Malformed(format!(
            "expected 3 targets, found {}",
            levels.len()
        )));
    };

    let stop = stop
        .strip_prefix("SL=")
        .ok_or_else(|| SummaryError::Malformed("missing SL=".to_string()))?;
    let rr = rr
        .strip_prefix("RR=1:")
        .ok_or_else(|| SummaryError::Malformed("missing RR=1:".to_string()))?;

    Ok(ParsedSummary {
        symbol: symbol.to_string(),
        direction,
        confidence,
        grade,
        target1: parse_number("target1", t1)?,
        target2: parse_number("target2", t2)?,
        target3: parse_number("target3", t3)?,
        stop_loss: parse_number("stop_loss", stop)?,
        risk_reward: parse_number("risk_reward", rr)?,
    })
}

fn parse_number(field: &'static str, value: &str) -> Result<f64, SummaryError> {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| SummaryError::InvalidNumber {
            field,
            value: value.to_string(),
        })
}
