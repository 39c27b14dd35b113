// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Widgets and their tags served from memory.
//!
//! ```sh
//! RUST_LOG=autocrud_core=debug cargo run --example widgets
//! curl -X POST localhost:3000/widgets -H 'content-type: application/json' -d '{"name":"a"}'
//! curl 'localhost:3000/widgets?page=1&size=10'
//! curl -X POST localhost:3000/widgets/tags -H 'content-type: application/json' \
//!     -d '{"widget_id":1,"tag_id":7}'
//! curl localhost:3000/widgets/1/tags
//! ```

use std::{error::Error, sync::Arc};

use autocrud::{Entity, MemoryStorage, Resource, SchemaRegistry};
use chrono::{DateTime, Utc};
use tracing_subscriber::EnvFilter;

#[derive(Entity)]
pub struct Widget {
    #[id]
    #[auto]
    pub id: i64,
    pub name: String,
    #[field(default = 0)]
    pub qty: i64,
    #[auto]
    pub created_at: DateTime<Utc>,
}

#[derive(Entity)]
pub struct WidgetTag {
    #[id]
    pub widget_id: i64,
    #[id]
    pub tag_id: i64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let registry = SchemaRegistry::default();
    let app: axum::Router = Resource::new("/widgets", Widget::descriptor())
        .session(Arc::new(MemoryStorage::new()))
        .secondary("tags", WidgetTag::descriptor(), None)
        .build(&registry)?
        .into_router();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
