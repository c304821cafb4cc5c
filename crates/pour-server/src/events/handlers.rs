//! Event handlers, one function per inbound event.

use pour_core::{OrderId, Role, StoreId, UserId, WireMessage};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::{Effect, EventContext, EventError, Target};
use crate::rooms::Room;

/// Result type every handler returns.
pub type HandlerResult = Result<Vec<Effect>, EventError>;

fn parse<T: DeserializeOwned>(event: &str, data: &Value) -> Result<T, EventError> {
    T::deserialize(data).map_err(|e| EventError::InvalidPayload {
        event: event.to_owned(),
        reason: e.to_string(),
    })
}

fn require(event: &str, field: &'static str, value: &str) -> Result<(), EventError> {
    if value.trim().is_empty() {
        Err(EventError::MissingField {
            event: event.to_owned(),
            field,
        })
    } else {
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderStatusPayload {
    order_id: OrderId,
    status: String,
    #[serde(default)]
    user_id: Option<UserId>,
}

impl OrderStatusPayload {
    fn parse(event: &str, data: &Value) -> Result<Self, EventError> {
        let p: Self = parse(event, data)?;
        require(event, "orderId", p.order_id.as_str())?;
        require(event, "status", &p.status)?;
        Ok(p)
    }

    /// Customer to notify directly. Blank ids are ignored.
    fn customer(&self) -> Option<UserId> {
        self.user_id
            .clone()
            .filter(|u| !u.as_str().trim().is_empty())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderRef {
    order_id: OrderId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreRef {
    store_id: StoreId,
}

/// `order:update` from a store: notify the customer, the order room and
/// the admin order feed.
pub fn order_update(ctx: &EventContext, data: &Value) -> HandlerResult {
    let p = OrderStatusPayload::parse("order:update", data)?;
    let store_id = ctx.identity.owned_store();
    let message = WireMessage::new(
        "order:updated",
        json!({
            "orderId": p.order_id,
            "status": p.status,
            "storeId": store_id,
            "timestamp": ctx.now,
        }),
    );
    let target = Target::rooms([Room::Order(p.order_id.clone()), Room::AdminOrders])
        .and_user(p.customer());
    Ok(vec![Effect::Emit { target, message }])
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreStatusPayload {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    is_open: Option<bool>,
}

/// `store:status` from a store: tell everyone the store opened or closed.
pub fn store_status(ctx: &EventContext, data: &Value) -> HandlerResult {
    const EVENT: &str = "store:status";
    let p: StoreStatusPayload = parse(EVENT, data)?;
    let status = match (p.status, p.is_open) {
        (Some(s), _) if !s.trim().is_empty() => s,
        (_, Some(true)) => "open".to_owned(),
        (_, Some(false)) => "closed".to_owned(),
        _ => {
            return Err(EventError::MissingField {
                event: EVENT.into(),
                field: "status",
            });
        }
    };
    let message = WireMessage::new(
        "store:status:updated",
        json!({
            "storeId": ctx.identity.owned_store(),
            "status": status,
            "timestamp": ctx.now,
        }),
    );
    Ok(vec![Effect::Emit {
        target: Target::All,
        message,
    }])
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationPayload {
    #[serde(default)]
    order_id: Option<OrderId>,
    latitude: f64,
    longitude: f64,
}

/// `location:update` from a courier: stream the position to the order
/// being delivered and to the admin order feed.
pub fn location_update(ctx: &EventContext, data: &Value) -> HandlerResult {
    const EVENT: &str = "location:update";
    let p: LocationPayload = parse(EVENT, data)?;
    if !(-90.0..=90.0).contains(&p.latitude) || !(-180.0..=180.0).contains(&p.longitude) {
        return Err(EventError::InvalidPayload {
            event: EVENT.into(),
            reason: format!("coordinates out of range: {}, {}", p.latitude, p.longitude),
        });
    }
    let order_id = p.order_id.filter(|o| !o.as_str().trim().is_empty());

    let mut payload = json!({
        "courierId": ctx.identity.user_id,
        "latitude": p.latitude,
        "longitude": p.longitude,
        "timestamp": ctx.now,
    });
    let mut rooms = vec![Room::AdminOrders];
    if let Some(order_id) = order_id {
        payload["orderId"] = json!(order_id);
        rooms.insert(0, Room::Order(order_id));
    }
    Ok(vec![Effect::Emit {
        target: Target::rooms(rooms),
        message: WireMessage::new("delivery:location", payload),
    }])
}

/// `delivery:status` from a courier: picked up, delivered, and so on.
pub fn delivery_status(ctx: &EventContext, data: &Value) -> HandlerResult {
    let p = OrderStatusPayload::parse("delivery:status", data)?;
    let message = WireMessage::new(
        "delivery:updated",
        json!({
            "orderId": p.order_id,
            "status": p.status,
            "courierId": ctx.identity.user_id,
            "timestamp": ctx.now,
        }),
    );
    let target = Target::rooms([Room::Order(p.order_id.clone()), Room::AdminOrders])
        .and_user(p.customer());
    Ok(vec![Effect::Emit { target, message }])
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotificationPayload {
    message: String,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    user_id: Option<UserId>,
}

/// `admin:notification`: to one user, else one role, else everyone.
pub fn admin_notification(ctx: &EventContext, data: &Value) -> HandlerResult {
    const EVENT: &str = "admin:notification";
    let p: NotificationPayload = parse(EVENT, data)?;
    require(EVENT, "message", &p.message)?;

    let user = p.user_id.filter(|u| !u.as_str().trim().is_empty());
    let role = match p.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(r) => Some(r.parse::<Role>().map_err(|e| EventError::InvalidPayload {
            event: EVENT.into(),
            reason: e.to_string(),
        })?),
        None => None,
    };
    let target = match (user, role) {
        (Some(u), _) => Target::user(u),
        (None, Some(r)) => Target::role(r),
        (None, None) => Target::All,
    };
    let message = WireMessage::new(
        EVENT,
        json!({
            "message": p.message,
            "from": ctx.identity.user_id,
            "timestamp": ctx.now,
        }),
    );
    Ok(vec![Effect::Emit { target, message }])
}

/// `order:track`: start receiving updates for an order.
pub fn order_track(_ctx: &EventContext, data: &Value) -> HandlerResult {
    const EVENT: &str = "order:track";
    let p: OrderRef = parse(EVENT, data)?;
    require(EVENT, "orderId", p.order_id.as_str())?;
    Ok(vec![
        Effect::Join(Room::Order(p.order_id.clone())),
        Effect::Reply(WireMessage::new("order:tracking", json!({"orderId": p.order_id}))),
    ])
}

/// `order:untrack`: stop receiving updates for an order.
pub fn order_untrack(_ctx: &EventContext, data: &Value) -> HandlerResult {
    const EVENT: &str = "order:untrack";
    let p: OrderRef = parse(EVENT, data)?;
    require(EVENT, "orderId", p.order_id.as_str())?;
    Ok(vec![
        Effect::Leave(Room::Order(p.order_id.clone())),
        Effect::Reply(WireMessage::new("order:untracked", json!({"orderId": p.order_id}))),
    ])
}

/// `chat:join`: open a chat with a store.
pub fn chat_join(_ctx: &EventContext, data: &Value) -> HandlerResult {
    const EVENT: &str = "chat:join";
    let p: StoreRef = parse(EVENT, data)?;
    require(EVENT, "storeId", p.store_id.as_str())?;
    Ok(vec![
        Effect::Join(Room::Chat(p.store_id.clone())),
        Effect::Reply(WireMessage::new("chat:joined", json!({"storeId": p.store_id}))),
    ])
}

/// `chat:leave`: close a chat with a store.
pub fn chat_leave(_ctx: &EventContext, data: &Value) -> HandlerResult {
    const EVENT: &str = "chat:leave";
    let p: StoreRef = parse(EVENT, data)?;
    require(EVENT, "storeId", p.store_id.as_str())?;
    Ok(vec![
        Effect::Leave(Room::Chat(p.store_id.clone())),
        Effect::Reply(WireMessage::new("chat:left", json!({"storeId": p.store_id}))),
    ])
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatPayload {
    #[serde(default)]
    store_id: Option<StoreId>,
    message: String,
}

/// `chat:message`. Customers name the store; stores always post to their
/// own chat.
pub fn chat_message(ctx: &EventContext, data: &Value) -> HandlerResult {
    const EVENT: &str = "chat:message";
    let p: ChatPayload = parse(EVENT, data)?;
    require(EVENT, "message", &p.message)?;

    let store_id = if ctx.identity.role == Role::Store {
        ctx.identity.owned_store()
    } else {
        let id = p.store_id.unwrap_or_else(|| StoreId::from(""));
        require(EVENT, "storeId", id.as_str())?;
        id
    };
    let message = WireMessage::new(
        EVENT,
        json!({
            "storeId": store_id,
            "from": ctx.identity.user_id,
            "role": ctx.identity.role,
            "message": p.message,
            "timestamp": ctx.now,
        }),
    );
    Ok(vec![Effect::Emit {
        target: Target::rooms([Room::Store(store_id.clone()), Room::Chat(store_id)]),
        message,
    }])
}
