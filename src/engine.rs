//! The poll cycle: fetch every known site, append what is new, deliver the
//! per-channel delta, then collect garbage.
//!
//! "New for the site" and "processed by the channel" are tracked separately:
//! one fetch serves every channel subscribed to that site, and a dispatch
//! failure for one channel must not block or falsely mark delivery for
//! another. An article is marked processed for a channel only after its
//! announcement was actually sent, so a crash or failure between the two
//! yields a duplicate announcement next cycle, never a lost one.

use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::time::Duration;

use crate::feed::fetch_articles;
use crate::notify::{format_announcement, Notifier};
use crate::storage::{Database, Site};

/// Per-cycle tuning. Both knobs exist because one slow or huge feed must
/// not stall the whole cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleOptions {
    /// Per-request fetch timeout.
    pub fetch_timeout: Duration,
    /// Upper bound on concurrently in-flight feed fetches.
    pub max_concurrent_fetches: usize,
}

impl Default for CycleOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
            max_concurrent_fetches: 8,
        }
    }
}

/// What one cycle did, for logging and tests.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub sites_polled: usize,
    pub fetch_failures: usize,
    pub new_articles: usize,
    pub delivered: usize,
    pub dispatch_failures: usize,
    pub purged_sites: usize,
}

struct PollOutcome {
    new_articles: usize,
    fetch_failed: bool,
}

/// Run one complete fetch-deliver-collect cycle over all known sites.
///
/// Phases, in order: (1) fetch all sites with bounded concurrency and
/// append their new articles to the registry; (2) for every (site, channel)
/// pair, announce the undelivered backlog oldest-first; (3) purge sites no
/// channel subscribes to. Failures in any phase are logged and isolated;
/// the cycle always runs to completion.
pub async fn run_cycle(
    db: &Database,
    client: &reqwest::Client,
    notifier: &Notifier,
    opts: &CycleOptions,
) -> Result<CycleSummary> {
    let sites = db.list_sites().await?;
    let mut summary = CycleSummary {
        sites_polled: sites.len(),
        ..CycleSummary::default()
    };

    // Phase 1: fetch fan-out. Sites touch disjoint registry rows, so the
    // fetches run concurrently; the bound keeps us polite to the network.
    let fetch_timeout = opts.fetch_timeout;
    let outcomes: Vec<Result<PollOutcome>> = stream::iter(sites.iter().cloned())
        .map(|site| {
            let db = db.clone();
            let client = client.clone();

            async move { poll_site(&db, &client, &site, fetch_timeout).await }
        })
        .buffer_unordered(opts.max_concurrent_fetches)
        .collect()
        .await;

    for outcome in outcomes {
        match outcome {
            Ok(o) => {
                summary.new_articles += o.new_articles;
                if o.fetch_failed {
                    summary.fetch_failures += 1;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to record poll outcome");
                summary.fetch_failures += 1;
            }
        }
    }

    // Phase 2: deliver the delta per (site, channel). Channels are
    // independent; an error for one site's delivery never aborts the rest.
    for site in &sites {
        match deliver_site(db, notifier, site).await {
            Ok((delivered, failures)) => {
                summary.delivered += delivered;
                summary.dispatch_failures += failures;
            }
            Err(e) => {
                tracing::warn!(site = %site.url, error = %e, "Delivery pass failed for site");
            }
        }
    }

    // Phase 3: reclaim sites nobody subscribes to anymore.
    let purged = db.purge_unreferenced_sites().await?;
    for url in &purged {
        tracing::info!(site = %url, "Purged unsubscribed site");
    }
    summary.purged_sites = purged.len();

    Ok(summary)
}

/// Fetch one site and append whatever the registry has not seen.
///
/// A fetch or parse failure is recorded on the site row and otherwise means
/// "no new information this cycle" — existing articles are untouched.
async fn poll_site(
    db: &Database,
    client: &reqwest::Client,
    site: &Site,
    timeout: Duration,
) -> Result<PollOutcome> {
    match fetch_articles(client, &site.url, timeout).await {
        Ok(parsed) => {
            let appended = db.append_new_articles(site.id, &parsed).await?;
            db.record_fetch_outcome(site.id, None).await?;

            if !appended.is_empty() {
                tracing::info!(
                    site = %site.url,
                    new = appended.len(),
                    total = parsed.len(),
                    "Discovered new articles"
                );
            }

            Ok(PollOutcome {
                new_articles: appended.len(),
                fetch_failed: false,
            })
        }
        Err(e) => {
            tracing::warn!(site = %site.url, error = %e, "Fetch failed, skipping site this cycle");
            db.record_fetch_outcome(site.id, Some(&e.to_string())).await?;

            Ok(PollOutcome {
                new_articles: 0,
                fetch_failed: true,
            })
        }
    }
}

/// Announce a site's undelivered backlog to every subscribed channel.
///
/// Oldest-first per channel. On the first dispatch failure for a channel the
/// rest of that channel's backlog is deferred to the next cycle, so the
/// order survives the retry; other channels continue unaffected.
async fn deliver_site(
    db: &Database,
    notifier: &Notifier,
    site: &Site,
) -> Result<(usize, usize)> {
    let channels = db.list_channels_subscribed_to(site.id).await?;
    let mut delivered = 0;
    let mut failures = 0;

    for channel in channels {
        let delta = db.undelivered_articles(&channel, site.id).await?;

        for article in delta {
            let text = format_announcement(&article);
            match notifier.send_to_channel(&channel, &text).await {
                Ok(()) => {
                    db.mark_processed(&channel, &article.identity).await?;
                    delivered += 1;
                    tracing::debug!(
                        channel = %channel,
                        site = %site.url,
                        title = %article.title,
                        "Announced article"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        channel = %channel,
                        site = %site.url,
                        title = %article.title,
                        error = %e,
                        "Dispatch failed, deferring rest of backlog to next cycle"
                    );
                    failures += 1;
                    break;
                }
            }
        }
    }

    Ok((delivered, failures))
}
