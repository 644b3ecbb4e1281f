//! Provider response payloads.

use serde_json::{Value, json};

/// Hex info hash used by the single-variant fixtures.
pub const INCEPTION_HASH: &str = "ABCD1234ABCD1234ABCD1234ABCD1234ABCD1234";
/// 1080p variant hash of the multi-variant fixture.
pub const MATRIX_1080P_HASH: &str = "1080AAAA1080AAAA1080AAAA1080AAAA1080AAAA";
/// 720p variant hash of the multi-variant fixture.
pub const MATRIX_720P_HASH: &str = "0720BBBB0720BBBB0720BBBB0720BBBB0720BBBB";

/// YTS `list_movies` body holding one movie with one 720p variant.
#[must_use]
pub fn yts_single_movie() -> Value {
    json!({
        "status": "ok",
        "status_message": "Query was successful",
        "data": {
            "movie_count": 1,
            "limit": 50,
            "page_number": 1,
            "movies": [{
                "id": 3175,
                "title": "Inception",
                "title_english": "Inception",
                "year": 2010,
                "rating": 8.8,
                "genres": ["Action", "Sci-Fi"],
                "language": "en",
                "summary": "A thief who steals corporate secrets...",
                "medium_cover_image": "https://img.example/inception-medium.jpg",
                "large_cover_image": "https://img.example/inception-large.jpg",
                "torrents": [{
                    "quality": "720p",
                    "hash": INCEPTION_HASH,
                    "seeds": 512,
                    "size": "1.07 GB"
                }]
            }]
        }
    })
}

/// YTS body with two movies; the first has 720p and 1080p variants, the
/// second lacks `title_english`, a large cover, and a language.
#[must_use]
pub fn yts_multi_variant() -> Value {
    json!({
        "status": "ok",
        "data": {
            "movies": [
                {
                    "id": 603,
                    "title": "The Matrix",
                    "title_english": "The Matrix",
                    "year": 1999,
                    "rating": 8.7,
                    "genres": ["Action"],
                    "language": "en",
                    "summary": "",
                    "large_cover_image": "https://img.example/matrix.jpg",
                    "torrents": [
                        {"quality": "720p", "hash": MATRIX_720P_HASH, "seeds": 90, "size": "700 MB"},
                        {"quality": "1080p", "hash": MATRIX_1080P_HASH, "seeds": 300, "size": "1.4 GB"}
                    ]
                },
                {
                    "id": "9001",
                    "title": "Obscure Short",
                    "year": "2021",
                    "medium_cover_image": "https://img.example/short.jpg",
                    "torrents": []
                }
            ]
        }
    })
}

/// YTS body for a query without matches; YTS omits `movies` entirely.
#[must_use]
pub fn yts_no_results() -> Value {
    json!({
        "status": "ok",
        "data": {"movie_count": 0, "limit": 50, "page_number": 1}
    })
}

/// Generic JSON provider body nested under `/results`, with variants.
#[must_use]
pub fn json_provider_results() -> Value {
    json!({
        "results": [
            {
                "id": 11,
                "name": "Planet Earth",
                "year": 2006,
                "tags": ["Nature"],
                "torrents": [
                    {"res": "480p", "info_hash": "EEEE0000EEEE0000EEEE0000EEEE0000EEEE0000", "peers": 4},
                    {"res": "1080p", "info_hash": "FFFF0000FFFF0000FFFF0000FFFF0000FFFF0000", "peers": 40}
                ]
            },
            {"name": "Missing id is kept by title"},
            {"id": 13}
        ]
    })
}
