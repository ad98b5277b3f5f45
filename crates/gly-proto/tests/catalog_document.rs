//! Catalog parsing against a document shaped like the live program feed.

use gly_proto::catalog::{parse_catalog, Episode, UNTITLED};
use serde_json::json;

fn program_document() -> serde_json::Value {
    json!({
        "pageProps": {
            "programData": {
                "programTitle": "Morning with Elad",
                "itemsByDate": [
                    {
                        "date": "2024-03",
                        "items": [
                            {
                                "itemTitle": "Interview: \"Harbour\" 2/3",
                                "itemDate": "05/03/2024",
                                "item_stream_url": "https://cdn.example/audio/5481.mp3"
                            },
                            {
                                "itemTitle": "Weekend edition",
                                "itemDate": "02/03/2024",
                                "item_stream_url": "https://cdn.example/audio/5470.mp3"
                            }
                        ]
                    },
                    {
                        "date": "2024-02",
                        "items": [
                            {
                                "itemDate": "28/02/2024",
                                "item_stream_url": "https://cdn.example/audio/5433.mp3"
                            },
                            {
                                "itemTitle": "No audio yet",
                                "itemDate": "27/02/2024"
                            }
                        ]
                    },
                    { "date": "2024-01" }
                ]
            }
        },
        "__N_SSP": true
    })
}

#[test]
fn parses_every_group_in_document_order() {
    let episodes = parse_catalog(&program_document());
    let dates: Vec<&str> = episodes.iter().map(|e| e.date.as_str()).collect();
    assert_eq!(
        dates,
        vec!["05/03/2024", "02/03/2024", "28/02/2024", "27/02/2024"]
    );
}

#[test]
fn missing_fields_get_placeholders() {
    let episodes = parse_catalog(&program_document());
    assert_eq!(episodes[2].title, UNTITLED);
    assert!(episodes[2].is_playable());

    assert_eq!(
        episodes[3],
        Episode {
            title: "No audio yet".to_string(),
            date: "27/02/2024".to_string(),
            url: String::new(),
        }
    );
    assert!(!episodes[3].is_playable());
}

#[test]
fn wrong_types_are_tolerated() {
    let doc = json!({
        "pageProps": { "programData": { "itemsByDate": [
            { "items": [ { "itemTitle": 42, "itemDate": null, "item_stream_url": "https://x/y.mp3" } ] },
            { "items": "not a list" }
        ]}}
    });
    let episodes = parse_catalog(&doc);
    assert_eq!(episodes.len(), 1);
    assert_eq!(episodes[0].title, UNTITLED);
    assert_eq!(episodes[0].date, "");
}
