use clap::{Parser, Subcommand, ValueEnum};
use musicnet::{
    pool_name, AlwaysOnline, CacheNamer, Config, ConnectionPool, DownloadCompleted,
    DownloadSelector, HttpTransport, PoolMember, Provider, ProviderQuery, QueryEvent, QueryKind,
    QueryOutcome, QueryRequest, ResultItem, SongItem,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "musicnet-cli")]
#[command(about = "Search music services and cache downloads", long_about = None)]
struct Cli {
    /// TOML settings file
    #[arg(long, env = "MUSICNET_CONFIG", default_value = "musicnet.toml")]
    config: PathBuf,

    /// Cache directory (overrides the settings file)
    #[arg(long, env = "MUSICNET_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Key for cache file names (overrides the settings file)
    #[arg(long, env = "MUSICNET_SECRET_KEY")]
    secret_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ProviderArg {
    Kw,
    Wy,
}

impl From<ProviderArg> for Provider {
    fn from(p: ProviderArg) -> Self {
        match p {
            ProviderArg::Kw => Provider::Kw,
            ProviderArg::Wy => Provider::Wy,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Songs,
    Artists,
    Albums,
    Comments,
    PlaylistComments,
}

impl From<KindArg> for QueryKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Songs => QueryKind::Songs,
            KindArg::Artists => QueryKind::ArtistList,
            KindArg::Albums => QueryKind::ArtistAlbums,
            KindArg::Comments => QueryKind::SongComments,
            KindArg::PlaylistComments => QueryKind::PlaylistComments,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Search a provider and print results as they arrive
    Search {
        /// Search term (artist list: "<category>*|||*<initial index>")
        term: String,

        #[arg(short, long, value_enum, default_value_t = ProviderArg::Kw)]
        provider: ProviderArg,

        #[arg(short, long, value_enum, default_value_t = KindArg::Songs)]
        kind: KindArg,

        /// Page to fetch
        #[arg(long, default_value_t = 0)]
        page: usize,

        /// Keep fetching until the last page
        #[arg(long)]
        all: bool,
    },
    /// Search songs and download the first results into the cache
    Download {
        term: String,

        #[arg(short, long, value_enum, default_value_t = ProviderArg::Kw)]
        provider: ProviderArg,

        /// Number of results to download
        #[arg(short, long, default_value_t = 1)]
        count: usize,
    },
}

/// Prints download completions relayed through the pool.
struct PlaylistPrinter;

impl PoolMember<DownloadCompleted> for PlaylistPrinter {
    fn receive(&self, _from: &str, done: &DownloadCompleted) {
        println!(
            "✅ {} [{}] {}{}",
            done.path.display(),
            done.format,
            done.duration,
            if done.play_now { " (play now)" } else { "" }
        );
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("musicnet=info,warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_item(index: usize, item: &ResultItem) {
    println!("{}. {}", index + 1, item.label());
}

/// Drain one page's events, returning its outcome and the songs seen.
async fn drain_page(
    events: &mut UnboundedReceiver<QueryEvent>,
    printed: &mut usize,
) -> (QueryOutcome, Vec<SongItem>) {
    let mut songs = Vec::new();
    while let Some(event) = events.recv().await {
        match event {
            QueryEvent::ItemDiscovered { item, .. } => {
                print_item(*printed, &item);
                *printed += 1;
                if let Some(song) = item.into_song() {
                    songs.push(song);
                }
            }
            QueryEvent::Completed { outcome, .. } => return (outcome, songs),
        }
    }
    (QueryOutcome::Superseded, songs)
}

fn page_size_for(config: &Config, provider: Provider) -> Option<usize> {
    match provider {
        Provider::Kw => config.kw.page_size,
        Provider::Wy => config.wy.page_size,
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)?;
    if let Some(dir) = cli.cache_dir {
        config.cache_dir = dir;
    }
    if let Some(key) = cli.secret_key {
        config.secret_key = key;
    }

    let transport = HttpTransport::new(&config.user_agent)?;

    match cli.command {
        Commands::Search {
            term,
            provider,
            kind,
            page,
            all,
        } => {
            let provider = Provider::from(provider);
            let query = ProviderQuery::new(provider, kind.into())?;
            let (request, mut events) = QueryRequest::new(query, transport);
            let request = match page_size_for(&config, provider) {
                Some(size) => request.with_page_size(size),
                None => request,
            };

            println!("Searching {} for '{}'...", provider, term);
            let mut printed = 0;

            request.start_to_search(&term).await;
            if page > 0 {
                // Page 0 reports the total the caller pages against
                drain_page(&mut events, &mut printed).await;
                printed = 0;
                request.start_to_page(page);
            }

            let mut current = page;
            loop {
                let (outcome, _) = drain_page(&mut events, &mut printed).await;
                match &outcome {
                    QueryOutcome::Empty => println!("No results"),
                    QueryOutcome::TransportError(e) => println!("❌ Request failed: {}", e),
                    QueryOutcome::ParseError(e) => println!("❌ Unexpected reply: {}", e),
                    _ => {}
                }
                if !all || !outcome.has_items() || !request.has_page(current + 1) {
                    break;
                }
                current += 1;
                request.start_to_page(current);
            }
            println!("{} results ({} reported)", printed, request.page_total());
        }
        Commands::Download {
            term,
            provider,
            count,
        } => {
            let provider = Provider::from(provider);
            let query = ProviderQuery::new(provider, QueryKind::Songs)?;
            let (request, mut events) = QueryRequest::new(query, transport.clone());

            println!("Searching {} for '{}'...", provider, term);
            request.start_to_search(&term).await;
            let (_, songs) = drain_page(&mut events, &mut 0).await;
            let selection: Vec<SongItem> = songs.into_iter().take(count).collect();
            if selection.is_empty() {
                println!("No songs to download");
                return Ok(());
            }

            let (selector, mut completions) =
                DownloadSelector::new(transport, CacheNamer::from_config(&config), AlwaysOnline);
            let selector = selector.with_timeout(config.download_timeout());

            let pool = Arc::new(ConnectionPool::<DownloadCompleted>::new());
            let printer = Arc::new(PlaylistPrinter);
            let downloader = pool_name::<DownloadSelector<HttpTransport, AlwaysOnline>>();
            pool.register(pool_name::<PlaylistPrinter>(), &printer);
            pool.link(downloader, pool_name::<PlaylistPrinter>());

            let relay_pool = pool.clone();
            let relay = tokio::spawn(async move {
                while let Some(done) = completions.recv().await {
                    relay_pool.notify(downloader, &done);
                }
            });

            println!("Downloading {} song(s)...", selection.len());
            let successful = selector.download_batch(&selection).await;
            drop(selector);
            relay.await?;

            pool.unlink(downloader);
            pool.unregister(pool_name::<PlaylistPrinter>());
            println!("   Successful: {}/{}", successful, selection.len());
        }
    }

    Ok(())
}
