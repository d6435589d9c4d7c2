use gateway_core::{AdapterError, OrderType, Side, TradeRequest};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The order payload handed to the automation terminal as its fourth
/// process argument: one self-describing JSON document per invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalOrder {
    pub symbol: String,
    pub side: Side,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub volume: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sl: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tp: Option<Decimal>,
}

impl From<&TradeRequest> for TerminalOrder {
    fn from(request: &TradeRequest) -> Self {
        Self {
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            volume: request.quantity,
            price: request.price,
            sl: request.stop_loss,
            tp: request.take_profit,
        }
    }
}

/// What the terminal wrote to stdout, once the line has passed the
/// framing checks. The terminal reports its own refusals as
/// `{"error": "..."}`; any other JSON object is the success payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TerminalReply {
    Failure { error: String },
    Payload(serde_json::Value),
}

/// Parse the single stdout line into a typed reply. Anything that is not
/// a JSON object is a protocol violation, never a partial result.
pub fn parse_reply(line: &str) -> Result<TerminalReply, AdapterError> {
    let value: serde_json::Value = serde_json::from_str(line)
        .map_err(|e| AdapterError::Parse(format!("terminal output is not valid JSON: {e}")))?;
    if !value.is_object() {
        return Err(AdapterError::Parse(
            "terminal reply is not a JSON object".to_string(),
        ));
    }
    if let Some(error) = value.get("error") {
        let error = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Ok(TerminalReply::Failure { error });
    }
    Ok(TerminalReply::Payload(value))
}

/// The shape a successful trade reply must carry.
#[derive(Debug, Deserialize)]
pub struct TerminalTradeReply {
    pub order_id: Option<serde_json::Value>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl TerminalTradeReply {
    /// The terminal reports order ids as either numbers or strings.
    pub fn order_id_string(&self) -> Option<String> {
        match self.order_id.as_ref()? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::AdapterErrorKind;
    use rust_decimal_macros::dec;

    #[test]
    fn test_order_round_trip() {
        let request = TradeRequest {
            symbol: "EURUSD".to_string(),
            order_type: OrderType::Limit,
            side: Side::Sell,
            quantity: dec!(0.10),
            price: Some(dec!(1.0950)),
            stop_loss: Some(dec!(1.1000)),
            take_profit: Some(dec!(1.0800)),
        };
        let order = TerminalOrder::from(&request);
        let json = serde_json::to_string(&order).unwrap();
        let parsed: TerminalOrder = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, order);
        assert_eq!(parsed.symbol, request.symbol);
        assert_eq!(parsed.volume, request.quantity);
        assert_eq!(parsed.sl, request.stop_loss);
        assert_eq!(parsed.tp, request.take_profit);
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let order = TerminalOrder {
            symbol: "XAUUSD".to_string(),
            side: Side::Buy,
            order_type: OrderType::Market,
            volume: dec!(0.01),
            price: None,
            sl: None,
            tp: None,
        };
        let json = serde_json::to_value(&order).unwrap();
        assert!(json.get("price").is_none());
        assert!(json.get("sl").is_none());
        assert_eq!(json["type"], "market");
        assert_eq!(json["side"], "buy");
    }

    #[test]
    fn test_parse_success_payload() {
        let reply = parse_reply(r#"{"balance": 100}"#).unwrap();
        match reply {
            TerminalReply::Payload(value) => assert_eq!(value["balance"], 100),
            other => panic!("expected payload, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_reply() {
        let reply = parse_reply(r#"{"error": "MT5 login failed"}"#).unwrap();
        assert_eq!(
            reply,
            TerminalReply::Failure {
                error: "MT5 login failed".to_string()
            }
        );
    }

    #[test]
    fn test_parse_rejects_non_object() {
        for line in ["42", "\"ok\"", "[1,2]", "not json at all"] {
            let err = parse_reply(line).unwrap_err();
            assert_eq!(err.kind(), AdapterErrorKind::ParseFailure, "line: {line}");
        }
    }
}
