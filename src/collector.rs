use crate::custody::PageHashRecord;
use crate::graph::{self, FetchError, GraphClient, Transport};
use crate::model::{MessagePage, RawMessage};
use indicatif::ProgressBar;
use std::thread;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct CollectOptions {
    pub page_size: usize,
    /// Pause between consecutive page requests.
    pub page_delay: Duration,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            page_delay: DEFAULT_PAGE_DELAY,
        }
    }
}

/// Everything a successful pagination run produced. `pages[i]` describes the
/// response that contributed the `i`-th slice of `messages`.
#[derive(Debug, Default)]
pub struct Collection {
    pub messages: Vec<RawMessage>,
    pub pages: Vec<PageHashRecord>,
}

impl Collection {
    pub fn page_message_total(&self) -> usize {
        self.pages.iter().map(|p| p.messages_count).sum()
    }
}

/// Fetch every message of a chat, page by page.
///
/// Strictly sequential: each request URL is the previous page's
/// `@odata.nextLink`. Each 200 response is hashed over its raw bytes before
/// it is parsed. Any failure aborts the whole run; nothing partial is
/// returned.
pub fn collect<T: Transport>(
    client: &GraphClient<T>,
    chat_id: &str,
    options: CollectOptions,
    pb: &ProgressBar,
) -> Result<Collection, FetchError> {
    collect_paced(client, chat_id, options, pb, thread::sleep)
}

/// [`collect`] with the pause between requests supplied by the caller.
/// `pause` runs once before each follow-up request, never after the last page.
pub fn collect_paced<T, P>(
    client: &GraphClient<T>,
    chat_id: &str,
    options: CollectOptions,
    pb: &ProgressBar,
    mut pause: P,
) -> Result<Collection, FetchError>
where
    T: Transport,
    P: FnMut(Duration),
{
    let mut collection = Collection::default();
    let mut url = client.messages_url(chat_id, options.page_size);

    loop {
        let page_number = collection.pages.len() + 1;
        let response = client.get_raw(&url)?;
        match response.status {
            200 => {}
            401 => return Err(FetchError::Unauthorized),
            _ => return Err(FetchError::status(&url, &response)),
        }

        let page: MessagePage = graph::decode(&url, &response.body)?;
        let record = PageHashRecord::new(
            page_number,
            &url,
            response.status,
            &response.body,
            page.value.len(),
        );
        debug!(
            page = page_number,
            messages = record.messages_count,
            hash = %record.response_hash,
            "fetched page"
        );
        collection.pages.push(record);
        collection.messages.extend(page.value);

        pb.set_message(format!(
            "Page {} - {} messages",
            page_number,
            collection.messages.len()
        ));
        pb.tick();

        match page.next_link {
            Some(next) => {
                url = next;
                if !options.page_delay.is_zero() {
                    pause(options.page_delay);
                }
            }
            None => return Ok(collection),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::sha256_hex;
    use crate::graph::testing::ScriptedTransport;

    const BASE: &str = "https://graph.test/v1.0";
    const FIRST: &str = "https://graph.test/v1.0/chats/19:c/messages?$top=50";

    fn quick() -> CollectOptions {
        CollectOptions {
            page_delay: Duration::ZERO,
            ..CollectOptions::default()
        }
    }

    fn run(transport: &ScriptedTransport) -> Result<Collection, FetchError> {
        let client = GraphClient::new(transport, BASE);
        collect(&client, "19:c", quick(), &ProgressBar::hidden())
    }

    #[test]
    fn follows_next_links_in_order() {
        let page1 = r#"{"value":[{"id":"3"},{"id":"2"}],"@odata.nextLink":"https://graph.test/next?token=a"}"#;
        let page2 = r#"{"value":[{"id":"1"}],"@odata.nextLink":"https://graph.test/next?token=b"}"#;
        let page3 = r#"{"value":[]}"#;
        let transport = ScriptedTransport::default()
            .route(FIRST, 200, page1)
            .route("https://graph.test/next?token=a", 200, page2)
            .route("https://graph.test/next?token=b", 200, page3);

        let collection = run(&transport).unwrap();

        let ids: Vec<_> = collection.messages.iter().map(|m| m["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["3", "2", "1"]);
        assert_eq!(collection.pages.len(), 3);
        assert_eq!(collection.pages[0].page, 1);
        assert_eq!(collection.pages[0].url, FIRST);
        assert_eq!(collection.pages[1].url, "https://graph.test/next?token=a");
        assert_eq!(collection.pages[2].messages_count, 0);
        assert_eq!(collection.page_message_total(), collection.messages.len());
    }

    #[test]
    fn hash_covers_raw_bytes_not_reserialized_json() {
        let body = "{ \"value\" : [ {\"id\":\"1\"} ]   }";
        let transport = ScriptedTransport::default().route(FIRST, 200, body);
        let collection = run(&transport).unwrap();
        assert_eq!(collection.pages[0].response_hash, sha256_hex(body.as_bytes()));
        assert_eq!(collection.pages[0].status_code, 200);
    }

    #[test]
    fn empty_conversation_terminates() {
        let transport = ScriptedTransport::default().route(FIRST, 200, r#"{"value":[]}"#);
        let collection = run(&transport).unwrap();
        assert!(collection.messages.is_empty());
        assert_eq!(collection.pages.len(), 1);
        assert_eq!(collection.page_message_total(), 0);
    }

    #[test]
    fn unauthorized_first_page() {
        let transport = ScriptedTransport::default().route(FIRST, 401, r#"{"error":{}}"#);
        let err = run(&transport).unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[test]
    fn later_failure_discards_everything() {
        let transport = ScriptedTransport::default()
            .route(
                FIRST,
                200,
                r#"{"value":[{"id":"1"}],"@odata.nextLink":"https://graph.test/next"}"#,
            )
            .route("https://graph.test/next", 503, "Service Unavailable");
        match run(&transport).unwrap_err() {
            FetchError::Status { status, url, snippet } => {
                assert_eq!(status, 503);
                assert_eq!(url, "https://graph.test/next");
                assert_eq!(snippet, "Service Unavailable");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn network_and_decode_failures_abort() {
        let transport = ScriptedTransport::default();
        assert!(matches!(run(&transport), Err(FetchError::Transport { .. })));

        let transport = ScriptedTransport::default().route(FIRST, 200, "<html>");
        assert!(matches!(run(&transport), Err(FetchError::Decode { .. })));
    }

    fn three_pages() -> ScriptedTransport {
        ScriptedTransport::default()
            .route(
                FIRST,
                200,
                r#"{"value":[{"id":"1"}],"@odata.nextLink":"https://graph.test/next?token=a"}"#,
            )
            .route(
                "https://graph.test/next?token=a",
                200,
                r#"{"value":[{"id":"2"}],"@odata.nextLink":"https://graph.test/next?token=b"}"#,
            )
            .route("https://graph.test/next?token=b", 200, r#"{"value":[{"id":"3"}]}"#)
    }

    #[test]
    fn pauses_between_pages_but_not_after_the_last() {
        let transport = three_pages();
        let client = GraphClient::new(&transport, BASE);
        let options = CollectOptions {
            page_delay: Duration::from_millis(30),
            ..CollectOptions::default()
        };
        let mut pauses = Vec::new();
        let mut requests_at_pause = Vec::new();

        let collection = collect_paced(&client, "19:c", options, &ProgressBar::hidden(), |d| {
            pauses.push(d);
            requests_at_pause.push(transport.requests.borrow().len());
        })
        .unwrap();

        assert_eq!(collection.pages.len(), 3);
        assert_eq!(pauses, vec![Duration::from_millis(30); 2]);
        assert_eq!(requests_at_pause, vec![1, 2]);
    }

    #[test]
    fn zero_delay_never_pauses() {
        let transport = three_pages();
        let client = GraphClient::new(&transport, BASE);
        let mut pauses = 0;
        collect_paced(&client, "19:c", quick(), &ProgressBar::hidden(), |_| pauses += 1).unwrap();
        assert_eq!(pauses, 0);
    }

    #[test]
    fn default_pacing_sleeps_between_requests() {
        let transport = three_pages();
        let client = GraphClient::new(&transport, BASE);
        let delay = Duration::from_millis(30);
        let options = CollectOptions {
            page_delay: delay,
            ..CollectOptions::default()
        };
        let started = std::time::Instant::now();
        collect(&client, "19:c", options, &ProgressBar::hidden()).unwrap();
        assert!(started.elapsed() >= 2 * delay);
    }

    #[test]
    fn page_size_is_configurable() {
        let transport = ScriptedTransport::default().route(
            "https://graph.test/v1.0/chats/19:c/messages?$top=10",
            200,
            r#"{"value":[]}"#,
        );
        let client = GraphClient::new(&transport, BASE);
        let options = CollectOptions {
            page_size: 10,
            page_delay: Duration::ZERO,
        };
        assert!(collect(&client, "19:c", options, &ProgressBar::hidden()).is_ok());
    }
}
