//! Navigable destinations shared with the host UI.
//!
//! The host owns navigation; the core only names destinations and parses
//! the route strings it receives back.

use crate::model::place::{PlaceId, UNSAVED_PLACE_ID};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub const PLACE_LIST_ROUTE: &str = "place_list";
pub const EDIT_PLACE_ROUTE: &str = "add_edit_place";
pub const PLACE_ID_ARG: &str = "placeId";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteError {
    UnknownRoute(String),
    InvalidPlaceId(String),
}

impl Display for RouteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownRoute(value) => write!(f, "unknown route: `{value}`"),
            Self::InvalidPlaceId(value) => write!(f, "invalid place id argument: `{value}`"),
        }
    }
}

impl Error for RouteError {}

/// Screen destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    PlaceList,
    /// `place_id == None` opens an empty draft.
    EditPlace { place_id: Option<PlaceId> },
}

impl Route {
    pub fn new_place() -> Self {
        Self::EditPlace { place_id: None }
    }

    /// Edit route for `id`; `0` is treated as "create new".
    pub fn edit(id: PlaceId) -> Self {
        Self::EditPlace {
            place_id: (id != UNSAVED_PLACE_ID).then_some(id),
        }
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PlaceList => f.write_str(PLACE_LIST_ROUTE),
            Self::EditPlace { place_id } => write!(
                f,
                "{EDIT_PLACE_ROUTE}?{PLACE_ID_ARG}={}",
                place_id.unwrap_or(UNSAVED_PLACE_ID)
            ),
        }
    }
}

impl FromStr for Route {
    type Err = RouteError;

    /// Parses `place_list` or `add_edit_place[?placeId=<id>]`.
    ///
    /// Accepts a trailing `L` on the id (`0L`) as written by older hosts.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (base, query) = match trimmed.split_once('?') {
            Some((base, query)) => (base, Some(query)),
            None => (trimmed, None),
        };

        match base {
            PLACE_LIST_ROUTE => Ok(Self::PlaceList),
            EDIT_PLACE_ROUTE => {
                let raw_id = query.into_iter().flat_map(|q| q.split('&')).find_map(|pair| {
                    pair.split_once('=')
                        .filter(|(key, _)| *key == PLACE_ID_ARG)
                        .map(|(_, raw)| raw)
                });
                match raw_id {
                    None => Ok(Self::new_place()),
                    Some(raw) => {
                        let digits = raw.strip_suffix('L').unwrap_or(raw);
                        let id = digits
                            .parse::<PlaceId>()
                            .ok()
                            .filter(|id| *id >= 0)
                            .ok_or_else(|| RouteError::InvalidPlaceId(raw.to_string()))?;
                        Ok(Self::edit(id))
                    }
                }
            }
            other => Err(RouteError::UnknownRoute(other.to_string())),
        }
    }
}

/// Receiver of navigation intents, implemented by the host.
pub trait Navigator {
    fn navigate(&mut self, route: Route);
}
