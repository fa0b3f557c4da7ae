//! Vector store maintenance behind the `store` subcommands.

use crate::{
    assistant_api::AssistantApi,
    error::ChatError,
    types::{StoreFile, VectorStore},
};

async fn find_store(api: &dyn AssistantApi, name: &str) -> Result<VectorStore, ChatError> {
    api.find_vector_store(name)
        .await?
        .ok_or_else(|| ChatError::StoreNotFound(name.to_string()))
}

/// Files currently attached to the store called `name`.
pub async fn list_files(api: &dyn AssistantApi, name: &str) -> Result<Vec<StoreFile>, ChatError> {
    let store = find_store(api, name).await?;
    api.list_store_files(&store.id).await
}

/// Remove every file from the store called `name`; returns how many were deleted.
pub async fn delete_all_files(api: &dyn AssistantApi, name: &str) -> Result<usize, ChatError> {
    let store = find_store(api, name).await?;
    let files = api.list_store_files(&store.id).await?;
    for file in &files {
        api.delete_store_file(&store.id, &file.id).await?;
        tracing::info!("deleted {} ({}) from store '{}'", file.name, file.id, name);
    }
    Ok(files.len())
}
