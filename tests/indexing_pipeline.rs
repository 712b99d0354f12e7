use std::sync::Arc;

use lens_social_indexer::metadata::MetadataFetcher;
use lens_social_indexer::models::ContentRef;
use lens_social_indexer::search::{SearchIndexClient, INSERT_PATH};
use lens_social_indexer::testing::RecordingTransport;
use serde_json::{json, Value};

fn item(id: usize) -> ContentRef {
    ContentRef {
        id: format!("1-{id}"),
        content_uri: Some(format!("ipfs://cid-{id}")),
    }
}

#[tokio::test]
async fn fetched_metadata_is_indexed_in_fixed_batches() {
    let gateway = Arc::new(RecordingTransport::new().with_default(json!({"name": "post"})));
    let index = Arc::new(RecordingTransport::new());
    let fetcher = MetadataFetcher::new(gateway.clone(), Arc::new(RecordingTransport::new()));
    let client = SearchIndexClient::new(index.clone());

    let items: Vec<ContentRef> = (1..=1234).map(item).collect();
    let docs: Vec<Value> = fetcher
        .fetch_metadata(&items)
        .await
        .unwrap()
        .into_iter()
        .flatten()
        .collect();
    let sent = client.insert("lens-engine", &docs).await.unwrap();

    assert_eq!(sent, 1234);
    assert_eq!(gateway.gets().await.len(), 1234);

    let posts = index.posts().await;
    let sizes: Vec<usize> = posts
        .iter()
        .map(|(_, body)| body["docs"].as_array().unwrap().len())
        .collect();
    assert_eq!(sizes, vec![500, 500, 234]);
    for (path, body) in &posts {
        assert_eq!(path, INSERT_PATH);
        assert_eq!(body["engine_id"], "lens-engine");
    }
    assert_eq!(posts[0].1["docs"][0], json!({"_id": "1-1", "name": "post"}));
}

#[tokio::test]
async fn items_without_metadata_never_reach_the_index() {
    let gateway = Arc::new(RecordingTransport::new());
    let index = Arc::new(RecordingTransport::new());
    let fetcher = MetadataFetcher::new(gateway, Arc::new(RecordingTransport::new()));
    let client = SearchIndexClient::new(index.clone());

    let items = vec![
        ContentRef {
            id: "1-1".to_string(),
            content_uri: None,
        },
        item(2),
    ];
    let docs: Vec<Value> = fetcher
        .fetch_metadata(&items)
        .await
        .unwrap()
        .into_iter()
        .flatten()
        .collect();

    assert!(docs.is_empty());
    assert_eq!(client.insert("lens-engine", &docs).await.unwrap(), 0);
    assert!(index.posts().await.is_empty());
}
