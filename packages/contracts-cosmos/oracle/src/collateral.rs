//! Collateral-module query boundary
//!
//! Path-addressed reads over entities stored by the collateral module. The
//! oracle never interprets them: each entity is kept as serialized JSON under
//! a `<Kind>-<id>` key and returned as is.
//!
//! | Path                   | Result                          |
//! |------------------------|---------------------------------|
//! | `order/<u64>`          | `Order-<id>`                    |
//! | `product/<id>`         | `Product-<id>`                  |
//! | `sell/<id>`            | `Sell-<id>`                     |
//! | `reservation/<id>`     | `Reservation-<id>`              |
//! | `products`, `sells`, `reservations` | JSON array of every entity of that kind |

use cosmwasm_std::{Binary, Deps, Order, StdError, StdResult, Storage};
use cw_storage_plus::Bound;

use crate::state::COLLATERAL;

/// Upper key of a kind's range; ids sort below it
const RANGE_END: &str = "zzzzzzzz";

pub fn query_collateral(deps: Deps, path: &str) -> StdResult<Binary> {
    query_path(deps.storage, path)
}

/// Resolve a `/`-separated collateral path.
pub fn query_path(storage: &dyn Storage, path: &str) -> StdResult<Binary> {
    let mut segments = path.split('/');
    let endpoint = segments.next().unwrap_or_default();
    let id = segments.next();

    match endpoint {
        "order" => {
            let id = require_id(endpoint, id)?;
            let id: u64 = id
                .parse()
                .map_err(|e| unknown_request(format!("wrong format for order id {}: {}", id, e)))?;
            load_entity(storage, "Order", &id.to_string())
        }
        "product" => load_entity(storage, "Product", require_id(endpoint, id)?),
        "sell" => load_entity(storage, "Sell", require_id(endpoint, id)?),
        "reservation" => load_entity(storage, "Reservation", require_id(endpoint, id)?),
        "products" => list_entities(storage, "Product"),
        "sells" => list_entities(storage, "Sell"),
        "reservations" => list_entities(storage, "Reservation"),
        other => Err(unknown_request(format!(
            "unknown collateral query endpoint: {}",
            other
        ))),
    }
}

fn unknown_request(msg: String) -> StdError {
    StdError::generic_err(format!("unknown request: {}", msg))
}

fn require_id<'a>(endpoint: &str, id: Option<&'a str>) -> StdResult<&'a str> {
    match id {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(unknown_request(format!("must specify the {} id", endpoint))),
    }
}

fn load_entity(storage: &dyn Storage, kind: &str, id: &str) -> StdResult<Binary> {
    let key = format!("{}-{}", kind, id);
    COLLATERAL
        .may_load(storage, &key)?
        .ok_or_else(|| StdError::not_found(format!("{} {}", kind.to_lowercase(), id)))
}

/// Splice every stored entity of `kind` into one JSON array
fn list_entities(storage: &dyn Storage, kind: &str) -> StdResult<Binary> {
    let start = format!("{}-", kind);
    let end = format!("{}-{}", kind, RANGE_END);

    let mut out = b"[".to_vec();
    let entities = COLLATERAL.range(
        storage,
        Some(Bound::inclusive(start.as_str())),
        Some(Bound::inclusive(end.as_str())),
        Order::Ascending,
    );
    for (i, entity) in entities.enumerate() {
        let (_, value) = entity?;
        if i > 0 {
            out.push(b',');
        }
        out.extend_from_slice(value.as_slice());
    }
    out.push(b']');

    Ok(Binary::from(out))
}
