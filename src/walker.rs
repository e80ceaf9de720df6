use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info};

use crate::config::TOP_PAGES;
use crate::error::{AppError, Result};
use crate::normalize::{parse_entry, CaptureStamp};
use crate::query::QueryApi;
use crate::types::{Mode, RankingEntry, Region};

pub const RANKING_QUERY: &str = "XRankingQuery";

fn refetch_query(mode: Mode) -> String {
    format!("DetailTabViewXRanking{}RefetchQuery", mode.code())
}

/// Produce the full leaderboard for one mode across both regions, in the
/// exact order the remote API returns it. Any query failure aborts the walk
/// immediately; the caller discards whatever was assembled.
pub async fn scrape_mode(
    client: &dyn QueryApi,
    mode: Mode,
    captured_at: DateTime<Utc>,
    rotation_start: DateTime<Utc>,
) -> Result<Vec<RankingEntry>> {
    let mut entries = Vec::new();
    for region in Region::ALL {
        // The season id is region-scoped and may change between cycles, so
        // it is resolved fresh on every walk and never cached.
        let season_id = current_season_id(client, region).await?;
        let stamp = CaptureStamp::new(captured_at, mode, region, rotation_start);
        let before = entries.len();
        for page in 1..=TOP_PAGES {
            walk_page(client, &season_id, mode, page, &stamp, &mut entries).await?;
        }
        info!(
            mode = %mode,
            region = %region,
            entries = entries.len() - before,
            "region walk complete"
        );
    }
    Ok(entries)
}

async fn current_season_id(client: &dyn QueryApi, region: Region) -> Result<String> {
    let response = client
        .query(RANKING_QUERY, json!({ "region": region.api_key() }))
        .await?;
    let id = response
        .root()
        .field("xRanking")?
        .field("currentSeason")?
        .field("id")?
        .as_str()?;
    Ok(id.to_string())
}

/// Walk one top-level page's forward cursor chain: query, append edges in
/// order, follow `endCursor` while `hasNextPage` holds.
async fn walk_page(
    client: &dyn QueryApi,
    season_id: &str,
    mode: Mode,
    page: usize,
    stamp: &CaptureStamp,
    out: &mut Vec<RankingEntry>,
) -> Result<()> {
    let query = refetch_query(mode);
    let board_field = format!("xRanking{}", mode.code());
    let mut cursor: Option<String> = None;

    loop {
        let variables = json!({
            "id": season_id,
            "mode": mode.code(),
            "page": page,
            "cursor": cursor,
        });
        let response = client.query(&query, variables).await?;
        let board = response.root().field("node")?.field(&board_field)?;

        for edge in board.field("edges")?.as_array()? {
            out.push(parse_entry(&edge.field("node")?, stamp)?);
        }

        let page_info = board.field("pageInfo")?;
        if !page_info.field("hasNextPage")?.as_bool()? {
            break;
        }
        match page_info.field("endCursor")?.as_opt_str()? {
            Some(next) => cursor = Some(next.to_string()),
            // A null cursor with more pages pending would restart the page
            // from the top and loop forever.
            None => {
                return Err(AppError::SchemaShape(format!(
                    "page {page} of {board_field} reported more results but no end cursor"
                )))
            }
        }
        debug!(mode = %mode, page, "following cursor");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use chrono::TimeZone;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::query::QueryResponse;

    /// Canned-response client: pops one response per query and records every
    /// call it served.
    struct MockClient {
        responses: Mutex<VecDeque<Value>>,
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl MockClient {
        fn new(responses: Vec<Value>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(String, Value)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl QueryApi for MockClient {
        async fn query(&self, query_name: &str, variables: Value) -> Result<QueryResponse> {
            self.calls
                .lock()
                .unwrap()
                .push((query_name.to_string(), variables));
            match self.responses.lock().unwrap().pop_front() {
                Some(value) => Ok(QueryResponse::new(value)),
                None => Err(AppError::Config("mock ran out of responses".to_string())),
            }
        }
    }

    fn b64(s: &str) -> String {
        STANDARD.encode(s)
    }

    fn edge(rank: i64) -> Value {
        json!({ "node": {
            "id": b64(&format!("XRankingPlayer:p{rank}")),
            "name": format!("Player {rank}"),
            "nameId": "0001",
            "byname": "Splatlandian Youth",
            "rank": rank,
            "xPower": 3000.0 - rank as f64,
            "weapon": { "id": b64("Weapon-40") },
            "nameplate": {
                "background": {
                    "id": b64("NameplateBackground-1"),
                    "textColor": { "r": 1.0, "g": 1.0, "b": 1.0 },
                },
                "badges": [null, null, null],
            },
        }})
    }

    fn board_page(ranks: &[i64], end_cursor: Option<&str>, has_next: bool) -> Value {
        json!({ "node": { "xRankingAr": {
            "edges": ranks.iter().map(|r| edge(*r)).collect::<Vec<_>>(),
            "pageInfo": { "hasNextPage": has_next, "endCursor": end_cursor },
        }}})
    }

    fn stamp() -> CaptureStamp {
        CaptureStamp::new(
            Utc.with_ymd_and_hms(2023, 12, 4, 8, 4, 0).unwrap(),
            Mode::SplatZones,
            Region::Tentatek,
            Utc.with_ymd_and_hms(2023, 12, 4, 8, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn cursor_walk_stops_after_last_page() {
        let client = MockClient::new(vec![
            board_page(&[1, 2], Some("c1"), true),
            board_page(&[3, 4], Some("c2"), true),
            board_page(&[5], Some("c3"), false),
        ]);

        let mut entries = Vec::new();
        walk_page(&client, "season-1", Mode::SplatZones, 1, &stamp(), &mut entries)
            .await
            .unwrap();

        // Exactly 3 requests; never a 4th with the stale cursor "c3".
        let calls = client.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].1["cursor"], Value::Null);
        assert_eq!(calls[1].1["cursor"], json!("c1"));
        assert_eq!(calls[2].1["cursor"], json!("c2"));

        // API rank order preserved, no re-sorting.
        let ranks: Vec<i32> = entries.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn walk_sends_query_name_and_variables_for_the_mode() {
        let client = MockClient::new(vec![board_page(&[1], None, false)]);
        let mut entries = Vec::new();
        walk_page(&client, "season-1", Mode::SplatZones, 3, &stamp(), &mut entries)
            .await
            .unwrap();

        let calls = client.calls();
        assert_eq!(calls[0].0, "DetailTabViewXRankingArRefetchQuery");
        assert_eq!(calls[0].1["id"], json!("season-1"));
        assert_eq!(calls[0].1["mode"], json!("Ar"));
        assert_eq!(calls[0].1["page"], json!(3));
    }

    #[tokio::test]
    async fn missing_cursor_with_more_pages_is_a_schema_error() {
        let client = MockClient::new(vec![board_page(&[1], None, true)]);
        let mut entries = Vec::new();
        let err = walk_page(&client, "season-1", Mode::SplatZones, 1, &stamp(), &mut entries)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SchemaShape(_)));
    }

    #[tokio::test]
    async fn query_failure_aborts_the_walk() {
        // One good page claiming more results, then the mock runs dry.
        let client = MockClient::new(vec![board_page(&[1, 2], Some("c1"), true)]);
        let mut entries = Vec::new();
        let result =
            walk_page(&client, "season-1", Mode::SplatZones, 1, &stamp(), &mut entries).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn scrape_mode_resolves_a_season_id_per_region() {
        let season = |id: &str| json!({ "xRanking": { "currentSeason": { "id": b64(id) } } });
        let mut responses = vec![season("XRankingSeason-p:1")];
        responses.extend((0..TOP_PAGES).map(|_| board_page(&[1], None, false)));
        responses.push(season("XRankingSeason-p:2"));
        responses.extend((0..TOP_PAGES).map(|_| board_page(&[1], None, false)));
        let client = MockClient::new(responses);

        let captured_at = Utc.with_ymd_and_hms(2023, 12, 4, 8, 4, 0).unwrap();
        let rotation_start = Utc.with_ymd_and_hms(2023, 12, 4, 8, 0, 0).unwrap();
        let entries = scrape_mode(&client, Mode::SplatZones, captured_at, rotation_start)
            .await
            .unwrap();

        // One season query plus TOP_PAGES page queries per region.
        let calls = client.calls();
        assert_eq!(calls.len(), 2 * (1 + TOP_PAGES));
        assert_eq!(calls[0].0, RANKING_QUERY);
        assert_eq!(calls[0].1["region"], json!("ATLANTIC"));
        assert_eq!(calls[1 + TOP_PAGES].1["region"], json!("PACIFIC"));

        // Both regions represented, Tentatek block first.
        assert_eq!(entries.len(), 2 * TOP_PAGES);
        assert!(entries[..TOP_PAGES]
            .iter()
            .all(|e| e.region == Region::Tentatek));
        assert!(entries[TOP_PAGES..]
            .iter()
            .all(|e| e.region == Region::Takoroka));
    }
}
