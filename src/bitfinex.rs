// ===============================
// src/bitfinex.rs
// ===============================
//
// Wire codec for the venue's v2 websocket. Inbound frames are either JSON
// objects (control events) or heterogeneous arrays [chanId, tag, payload];
// both are decoded here into tagged variants. Outbound frames are built
// here and serialized once.

use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sha2::Sha384;
use std::str::FromStr;

use crate::domain::{
    Caps, Level, NotifKind, NotifStatus, Notification, Order, OrderStatus, Trade, Wallet,
};
use crate::precision::{fmt_dec, round_price};

// Venue info codes.
pub const CODE_RESTART: i64 = 20051;
pub const CODE_MAINTENANCE_BEGIN: i64 = 20060;
pub const CODE_MAINTENANCE_END: i64 = 20061;

#[derive(Debug, Clone, PartialEq)]
pub enum WsIn {
    Info { version: Option<u64>, code: Option<i64> },
    Subscribed { channel: String, symbol: String, chan_id: i64 },
    Unsubscribed { chan_id: i64 },
    AuthOk { caps: Caps },
    AuthErr { code: Option<i64>, msg: String },
    ProtoError { code: Option<i64>, msg: String },
    Data { chan_id: i64, msg: DataMsg },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataMsg {
    Heartbeat,
    BookSnapshot(Vec<Level>),
    BookDelta(Level),
    WalletSnapshot(Vec<Wallet>),
    WalletUpdate(Wallet),
    OrderSnapshot(Vec<Order>),
    OrderNew(Order),
    OrderUpdate(Order),
    OrderClose(Order),
    TradeExecuted(Trade),
    TradeUpdate(Trade),
    Notice(Notification),
}

// ---- auth ----

/// Nonce: wall-clock milliseconds x 1000, as a decimal string.
pub fn auth_nonce(now_ms: u64) -> String {
    (now_ms.saturating_mul(1000)).to_string()
}

/// Lowercase hex HMAC-SHA384 digest.
pub fn sign(secret: &str, payload: &str) -> String {
    let mut mac =
        Hmac::<Sha384>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

pub fn auth_frame(api_key: &str, api_secret: &str, now_ms: u64) -> String {
    let nonce = auth_nonce(now_ms);
    let payload = format!("AUTH{nonce}{nonce}");
    json!({
        "event": "auth",
        "apiKey": api_key,
        "authSig": sign(api_secret, &payload),
        "authPayload": payload,
        "authNonce": nonce,
        "calc": 1,
    })
    .to_string()
}

// ---- outbound frames ----

pub fn subscribe_book(symbol: &str) -> String {
    json!({
        "event": "subscribe",
        "channel": "book",
        "symbol": symbol,
        "prec": "P0",
        "freq": "F1",
        "len": "100",
    })
    .to_string()
}

pub fn unsubscribe(chan_id: i64) -> String {
    json!({"event": "unsubscribe", "chanId": chan_id}).to_string()
}

pub fn new_order(
    gid: i64,
    cid: i64,
    order_type: &str,
    symbol: &str,
    amount: Decimal,
    price: Decimal,
) -> String {
    json!([0, "on", null, {
        "gid": gid,
        "cid": cid,
        "type": order_type,
        "symbol": symbol,
        "amount": fmt_dec(amount),
        // the venue rejects limit prices beyond 5 significant digits
        "price": fmt_dec(round_price(price)),
        "hidden": 0,
    }])
    .to_string()
}

pub fn cancel_by_id(id: i64) -> String {
    json!([0, "oc", null, {"id": id}]).to_string()
}

pub fn cancel_by_cid(cid: i64, cid_date: &str) -> String {
    json!([0, "oc", null, {"cid": cid, "cid_date": cid_date}]).to_string()
}

pub fn calc(keys: &[String]) -> String {
    let entries: Vec<Value> = keys.iter().map(|k| json!([k])).collect();
    json!([0, "calc", null, entries]).to_string()
}

// ---- inbound decode ----

fn dec_of(v: &Value) -> Option<Decimal> {
    match v {
        Value::Number(n) => {
            let s = n.to_string();
            Decimal::from_str(&s)
                .or_else(|_| Decimal::from_scientific(&s))
                .ok()
        }
        Value::String(s) => Decimal::from_str(s)
            .or_else(|_| Decimal::from_scientific(s))
            .ok(),
        _ => None,
    }
}

pub fn parse_frame(txt: &str) -> Option<WsIn> {
    let v: Value = serde_json::from_str(txt).ok()?;
    match &v {
        Value::Object(_) => parse_event(&v),
        Value::Array(arr) => parse_data(arr),
        _ => None,
    }
}

fn parse_event(v: &Value) -> Option<WsIn> {
    match v.get("event")?.as_str()? {
        "info" => Some(WsIn::Info {
            version: v.get("version").and_then(Value::as_u64),
            code: v.get("code").and_then(Value::as_i64),
        }),
        "subscribed" => Some(WsIn::Subscribed {
            channel: v.get("channel")?.as_str()?.to_string(),
            symbol: v
                .get("symbol")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            chan_id: v.get("chanId")?.as_i64()?,
        }),
        "unsubscribed" => Some(WsIn::Unsubscribed {
            chan_id: v.get("chanId")?.as_i64()?,
        }),
        "auth" => {
            if v.get("status").and_then(Value::as_str) == Some("OK") {
                Some(WsIn::AuthOk {
                    caps: parse_caps(v.get("caps")),
                })
            } else {
                Some(WsIn::AuthErr {
                    code: v.get("code").and_then(Value::as_i64),
                    msg: v
                        .get("msg")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                })
            }
        }
        "error" => Some(WsIn::ProtoError {
            code: v.get("code").and_then(Value::as_i64),
            msg: v
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        _ => None,
    }
}

fn parse_caps(v: Option<&Value>) -> Caps {
    let flag = |scope: &str, op: &str| -> bool {
        v.and_then(|c| c.get(scope))
            .and_then(|s| s.get(op))
            .and_then(Value::as_u64)
            == Some(1)
    };
    Caps {
        orders_read: flag("orders", "read"),
        orders_write: flag("orders", "write"),
        wallets_read: flag("wallets", "read"),
    }
}

fn parse_data(arr: &[Value]) -> Option<WsIn> {
    let chan_id = arr.first()?.as_i64()?;
    let second = arr.get(1)?;

    // book channel payloads are bare arrays
    if let Value::Array(payload) = second {
        let msg = if payload.first().map(Value::is_array).unwrap_or(false) {
            let levels: Vec<Level> = payload.iter().filter_map(parse_level).collect();
            DataMsg::BookSnapshot(levels)
        } else {
            DataMsg::BookDelta(parse_level(second)?)
        };
        return Some(WsIn::Data { chan_id, msg });
    }

    let tag = second.as_str()?;
    if tag == "hb" {
        return Some(WsIn::Data {
            chan_id,
            msg: DataMsg::Heartbeat,
        });
    }

    let payload = arr.get(2)?;
    let msg = match tag {
        "ws" => DataMsg::WalletSnapshot(
            payload
                .as_array()?
                .iter()
                .filter_map(parse_wallet)
                .collect(),
        ),
        "wu" => DataMsg::WalletUpdate(parse_wallet(payload)?),
        "os" => DataMsg::OrderSnapshot(
            payload
                .as_array()?
                .iter()
                .filter_map(parse_order)
                .collect(),
        ),
        "on" => DataMsg::OrderNew(parse_order(payload)?),
        "ou" => DataMsg::OrderUpdate(parse_order(payload)?),
        "oc" => DataMsg::OrderClose(parse_order(payload)?),
        "te" => DataMsg::TradeExecuted(parse_trade(payload)?),
        "tu" => DataMsg::TradeUpdate(parse_trade(payload)?),
        "n" => DataMsg::Notice(parse_notification(payload)?),
        _ => return None,
    };
    Some(WsIn::Data { chan_id, msg })
}

fn parse_level(v: &Value) -> Option<Level> {
    let arr = v.as_array()?;
    Some(Level {
        price: dec_of(arr.first()?)?,
        count: arr.get(1)?.as_u64()? as u32,
        amount: dec_of(arr.get(2)?)?,
    })
}

fn parse_wallet(v: &Value) -> Option<Wallet> {
    let arr = v.as_array()?;
    Some(Wallet {
        wallet_type: arr.first()?.as_str()?.to_string(),
        currency: arr.get(1)?.as_str()?.to_string(),
        balance: dec_of(arr.get(2)?)?,
        available: arr.get(4).and_then(dec_of),
    })
}

/// Order arrays: [ID, GID, CID, SYMBOL, MTS_CREATE, MTS_UPDATE, AMOUNT,
/// AMOUNT_ORIG, TYPE, .., STATUS(13), .., PRICE(16), PRICE_AVG(17), ..]
fn parse_order(v: &Value) -> Option<Order> {
    let arr = v.as_array()?;
    Some(Order {
        // order arrays embedded in notifications carry a null id until the
        // venue accepts the order
        id: arr.first().and_then(Value::as_i64).unwrap_or(0),
        gid: arr.get(1).and_then(Value::as_i64),
        cid: arr.get(2)?.as_i64()?,
        cid_date: None,
        symbol: arr.get(3)?.as_str()?.to_string(),
        amount: arr.get(6).and_then(dec_of).unwrap_or(Decimal::ZERO),
        amount_orig: arr.get(7).and_then(dec_of).unwrap_or(Decimal::ZERO),
        order_type: arr
            .get(8)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        status: OrderStatus::parse(arr.get(13).and_then(Value::as_str).unwrap_or("ACTIVE")),
        price: arr.get(16).and_then(dec_of).unwrap_or(Decimal::ZERO),
    })
}

/// Trade arrays: [ID, SYMBOL, MTS, ORDER_ID, EXEC_AMOUNT, EXEC_PRICE,
/// ORDER_TYPE, ORDER_PRICE, MAKER, FEE, FEE_CURRENCY]
fn parse_trade(v: &Value) -> Option<Trade> {
    let arr = v.as_array()?;
    Some(Trade {
        id: arr.first()?.as_i64()?,
        symbol: arr.get(1)?.as_str()?.to_string(),
        order_id: arr.get(3)?.as_i64()?,
        exec_amount: dec_of(arr.get(4)?)?,
        exec_price: dec_of(arr.get(5)?)?,
        fee: arr.get(9).and_then(dec_of),
        fee_currency: arr
            .get(10)
            .and_then(Value::as_str)
            .map(|s| s.to_string()),
    })
}

/// Notification arrays: [MTS, TYPE, MESSAGE_ID, _, INFO, CODE, STATUS, TEXT]
fn parse_notification(v: &Value) -> Option<Notification> {
    let arr = v.as_array()?;
    let kind = match arr.get(1).and_then(Value::as_str) {
        Some("on-req") => NotifKind::OnReq,
        Some("oc-req") => NotifKind::OcReq,
        _ => NotifKind::Other,
    };
    let status = match arr.get(6).and_then(Value::as_str) {
        Some(s) if s.contains("SUCCESS") => NotifStatus::Success,
        _ => NotifStatus::Error,
    };
    Some(Notification {
        kind,
        status,
        text: arr
            .get(7)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        order: arr.get(4).and_then(parse_order),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn auth_frame_shape() {
        let frame = auth_frame("key", "secret", 1_700_000_000_000);
        let v: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v["event"], "auth");
        assert_eq!(v["authNonce"], "1700000000000000");
        assert_eq!(v["authPayload"], "AUTH17000000000000001700000000000000");
        let sig = v["authSig"].as_str().unwrap();
        assert_eq!(sig.len(), 96); // SHA-384 hex
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn info_and_codes() {
        let f = parse_frame(r#"{"event":"info","version":2,"platform":{"status":1}}"#).unwrap();
        assert_eq!(
            f,
            WsIn::Info {
                version: Some(2),
                code: None
            }
        );
        let f = parse_frame(r#"{"event":"info","code":20060,"msg":"maintenance"}"#).unwrap();
        assert_eq!(
            f,
            WsIn::Info {
                version: None,
                code: Some(CODE_MAINTENANCE_BEGIN)
            }
        );
    }

    #[test]
    fn subscribed_ack() {
        let f = parse_frame(
            r#"{"event":"subscribed","channel":"book","chanId":431,"symbol":"tBTCUSD","prec":"P0","freq":"F1","len":"100","pair":"BTCUSD"}"#,
        )
        .unwrap();
        assert_eq!(
            f,
            WsIn::Subscribed {
                channel: "book".into(),
                symbol: "tBTCUSD".into(),
                chan_id: 431
            }
        );
    }

    #[test]
    fn book_snapshot_and_delta() {
        let f = parse_frame(r#"[431,[[100.1,1,-5],[100.2,2,-10],[99.9,3,7]]]"#).unwrap();
        match f {
            WsIn::Data {
                chan_id: 431,
                msg: DataMsg::BookSnapshot(levels),
            } => {
                assert_eq!(levels.len(), 3);
                assert_eq!(levels[0].price, dec!(100.1));
                assert_eq!(levels[0].amount, dec!(-5));
            }
            other => panic!("unexpected {other:?}"),
        }

        let f = parse_frame(r#"[431,[100.1,0,-1]]"#).unwrap();
        assert_eq!(
            f,
            WsIn::Data {
                chan_id: 431,
                msg: DataMsg::BookDelta(Level {
                    price: dec!(100.1),
                    count: 0,
                    amount: dec!(-1)
                })
            }
        );
    }

    #[test]
    fn heartbeat_and_unknown_tag() {
        assert_eq!(
            parse_frame(r#"[431,"hb"]"#).unwrap(),
            WsIn::Data {
                chan_id: 431,
                msg: DataMsg::Heartbeat
            }
        );
        assert!(parse_frame(r#"[0,"zz",[1,2,3]]"#).is_none());
        assert!(parse_frame("not json").is_none());
    }

    #[test]
    fn wallet_update_with_null_available() {
        let f = parse_frame(r#"[0,"wu",["exchange","USD",1000,0,null]]"#).unwrap();
        match f {
            WsIn::Data {
                msg: DataMsg::WalletUpdate(w),
                ..
            } => {
                assert_eq!(w.wallet_type, "exchange");
                assert_eq!(w.balance, dec!(1000));
                assert_eq!(w.available, None);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn order_close_executed() {
        let f = parse_frame(
            r#"[0,"oc",[12345,7,881199,"tBTCUSD",1,1,0,0.5,"EXCHANGE LIMIT",null,null,null,0,"EXECUTED @ 100.2(0.5)",null,null,100.2,100.2,0,0,null,null,null,0,0,null]]"#,
        )
        .unwrap();
        match f {
            WsIn::Data {
                msg: DataMsg::OrderClose(o),
                ..
            } => {
                assert_eq!(o.id, 12345);
                assert_eq!(o.cid, 881199);
                assert_eq!(o.status, OrderStatus::Executed);
                assert_eq!(o.amount_orig, dec!(0.5));
                assert_eq!(o.price, dec!(100.2));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn notification_on_req_error() {
        let f = parse_frame(
            r#"[0,"n",[1575282446000,"on-req",null,null,[null,null,881199,"tBTCUSD",null,null,0.5,0.5,"EXCHANGE LIMIT",null,null,null,null,null,null,null,100.2,null,null,null,null,null,null,0,null,null],null,"ERROR","Invalid order: not enough exchange balance"]]"#,
        );
        match f {
            Some(WsIn::Data {
                msg: DataMsg::Notice(n),
                ..
            }) => {
                assert_eq!(n.kind, NotifKind::OnReq);
                assert_eq!(n.status, NotifStatus::Error);
                assert!(n.text.contains("not enough"));
                // cid survives even though the order id is still null
                assert_eq!(n.order.unwrap().cid, 881199);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn outbound_new_order_frame() {
        let frame = new_order(77, 4242, "EXCHANGE LIMIT", "tBTCUSD", dec!(0.5), dec!(100.2));
        let v: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v[0], 0);
        assert_eq!(v[1], "on");
        assert!(v[2].is_null());
        assert_eq!(v[3]["cid"], 4242);
        assert_eq!(v[3]["amount"], "0.5");
        assert_eq!(v[3]["price"], "100.2");
    }

    #[test]
    fn outbound_price_capped_at_five_significant_digits() {
        let frame = new_order(1, 2, "EXCHANGE LIMIT", "tBTCUSD", dec!(0.5), dec!(10000.123));
        let v: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v[3]["price"], "10000");

        let frame = new_order(1, 2, "EXCHANGE LIMIT", "tETHBTC", dec!(2), dec!(0.039456789));
        let v: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(v[3]["price"], "0.039457");
    }

    #[test]
    fn outbound_cancel_and_calc() {
        let v: Value = serde_json::from_str(&cancel_by_id(12345)).unwrap();
        assert_eq!(v[1], "oc");
        assert_eq!(v[3]["id"], 12345);

        let v: Value = serde_json::from_str(&cancel_by_cid(4242, "2026-08-02")).unwrap();
        assert_eq!(v[3]["cid"], 4242);
        assert_eq!(v[3]["cid_date"], "2026-08-02");

        let v: Value =
            serde_json::from_str(&calc(&["wallet_exchange_USD".to_string()])).unwrap();
        assert_eq!(v[1], "calc");
        assert_eq!(v[3][0][0], "wallet_exchange_USD");
    }
}
