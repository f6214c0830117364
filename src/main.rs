fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(not(feature = "fetch"))]
    {
        eprintln!("Error: This binary requires the 'fetch' feature.");
        eprintln!("Build with: cargo run --release --bin geocontext --features fetch");
        std::process::exit(1);
    }

    #[cfg(feature = "fetch")]
    {
        use geocontext::{ContextCache, Engine, EngineConfig, FileStore, Location, OverpassFetcher};
        use std::sync::Arc;
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "geocontext=info".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();

        let args: Vec<String> = std::env::args().collect();
        if args.len() < 3 {
            eprintln!("Usage: {} <lat> <lon> [radius_km] [location_id]", args[0]);
            return Ok(());
        }

        let lat: f64 = args[1].parse()?;
        let lon: f64 = args[2].parse()?;
        let radius_km: f64 = args.get(3).map(|r| r.parse()).transpose()?.unwrap_or(0.0);
        let location_id = args.get(4).map(String::as_str);

        let config = match std::env::var("GEOCONTEXT_CONFIG") {
            Ok(path) => EngineConfig::load(path)?,
            Err(_) => EngineConfig::default(),
        };
        let cache_dir = std::env::var("GEOCONTEXT_CACHE_DIR")
            .unwrap_or_else(|_| ".geocontext-cache".to_string());

        let store = FileStore::open(cache_dir, Some(config.cache.capacity_bytes))?;
        let cache = ContextCache::init(config.cache.clone(), Arc::new(store));
        let fetcher = OverpassFetcher::new(&config.upstream)?;
        let engine = Engine::new(config, cache, fetcher);

        let outcome = engine.query(Location::new(lat, lon), radius_km, location_id, &[]);
        println!("{}", serde_json::to_string_pretty(&outcome)?);

        let costs = engine.shutdown();
        eprintln!(
            "upstream calls: {}, hits: {}, misses: {}, latency: {} ms",
            costs.upstream_calls, costs.cache_hits, costs.cache_misses, costs.upstream_latency_ms
        );
        Ok(())
    }
}
