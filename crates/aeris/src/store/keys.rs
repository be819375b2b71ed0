//! Object-store key layout.
//!
//! ```text
//! datasource/uuid/{id}                      descriptor JSON
//! datasource/name/{base64url(name)}/{id}    name index marker
//! data/uuid/{id}/{version}/{daterange}      segment payload
//! obs_surface/uuid/{catalog_id}             catalog JSON
//! ```

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use crate::daterange::Daterange;
use uuid::Uuid;

/// Fixed id of the catalog document.
pub const CATALOG_ID: &str = "da0b8b44-6f85-4d3c-b6a3-3dde34f6dea1";

/// Prefix of all datasource descriptors.
pub const DATASOURCE_PREFIX: &str = "datasource/uuid/";

/// Prefix of the name index.
pub const NAME_INDEX_PREFIX: &str = "datasource/name/";

/// Key of a datasource descriptor.
pub fn datasource(id: &Uuid) -> String {
    format!("{DATASOURCE_PREFIX}{id}")
}

/// Prefix holding every payload of a datasource.
pub fn data_prefix(id: &Uuid) -> String {
    format!("data/uuid/{id}/")
}

/// Key of one segment payload.
pub fn segment(id: &Uuid, version: &str, daterange: &Daterange) -> String {
    format!("data/uuid/{id}/{version}/{daterange}")
}

/// Key of the catalog document.
pub fn catalog() -> String {
    format!("obs_surface/uuid/{CATALOG_ID}")
}

/// Prefix listing every id registered under `name`.
pub fn name_prefix(name: &str) -> String {
    format!("{NAME_INDEX_PREFIX}{}/", URL_SAFE_NO_PAD.encode(name.as_bytes()))
}

/// Name index marker for `(name, id)`.
pub fn name_entry(name: &str, id: &Uuid) -> String {
    format!("{}{id}", name_prefix(name))
}
