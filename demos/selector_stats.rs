//! Hit-rate analyzer for tree-keyed selectors.
//!
//! Runs a synthetic posts-by-site workload at several state churn rates
//! to show how replacement frequency drives the hit rate.
//!
//! Run with:
//! ```bash
//! cargo run --release --example selector_stats -- --rounds 100000
//! ```

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use treememo::config::SelectorConfig;
use treememo::selector::Selector;

#[derive(Debug, Clone)]
struct Post {
    id: u64,
    site: u64,
}

struct State {
    posts: Arc<Vec<Post>>,
}

#[derive(Debug, Parser)]
#[command(author, version, about = "Hit-rate analyzer for tree-keyed selectors")]
struct Cli {
    /// Number of sites in the synthetic state.
    #[arg(long, default_value = "20")]
    sites: u64,

    /// Posts per site.
    #[arg(long, default_value = "500")]
    posts: u64,

    /// Lookups per churn setting.
    #[arg(long, default_value = "100000")]
    rounds: u64,
}

fn make_posts(sites: u64, per_site: u64) -> Arc<Vec<Post>> {
    let mut posts = Vec::with_capacity((sites * per_site) as usize);
    for site in 0..sites {
        for i in 0..per_site {
            posts.push(Post { id: site * per_site + i, site });
        }
    }
    Arc::new(posts)
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let cli = Cli::parse();

    println!("=== Selector Hit-Rate Analyzer ===\n");
    println!(
        "Workload: {} sites x {} posts, {} lookups\n",
        cli.sites, cli.posts, cli.rounds
    );
    println!(
        "{:>12} {:>12} {:>12} {:>12} {:>10} {:>8}",
        "Churn every", "Time (ms)", "Hits", "Misses", "Hit Rate", "Entries"
    );
    println!("{}", "-".repeat(72));

    for churn in [10u64, 100, 1_000, 10_000] {
        let selector = Selector::with_config(
            |state: &State, _args: &(u64,)| (Arc::clone(&state.posts),),
            |(posts,): &(Arc<Vec<Post>>,), &(site,): &(u64,)| {
                posts
                    .iter()
                    .filter(|post| post.site == site)
                    .map(|post| post.id)
                    .collect::<Vec<_>>()
            },
            SelectorConfig::default().with_purge_watermark(64),
        );

        let mut state = State {
            posts: make_posts(cli.sites, cli.posts),
        };

        let start = Instant::now();
        for round in 0..cli.rounds {
            if round > 0 && round % churn == 0 {
                // Simulate a store update: replace the whole slice.
                state.posts = make_posts(cli.sites, cli.posts);
            }
            let ids = selector.select(&state, (round % cli.sites,));
            assert_eq!(ids.len(), cli.posts as usize);
        }
        let elapsed = start.elapsed();

        let hits = selector.hits();
        let misses = selector.misses();
        let total = hits + misses;
        let hit_rate = if total > 0 {
            100.0 * hits as f64 / total as f64
        } else {
            0.0
        };

        println!(
            "{:>12} {:>12.2} {:>12} {:>12} {:>9.1}% {:>8}",
            churn,
            elapsed.as_secs_f64() * 1000.0,
            hits,
            misses,
            hit_rate,
            selector.len()
        );
    }

    Ok(())
}
