// src/providers/endpoints.rs
//! Upstream URL catalogue.

pub const COINGECKO_BASE_URL: &str = "https://api.coingecko.com/api/v3/";
pub const CRYPTOID_BASE_URL: &str = "https://chainz.cryptoid.info/";
pub const MEMPOOL_BASE_URL: &str = "https://mempool.space/api/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    coingecko: String,
    cryptoid: String,
    mempool: String,
}

fn with_slash(base: &str) -> String {
    let base = base.trim();
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(COINGECKO_BASE_URL, CRYPTOID_BASE_URL)
    }
}

impl Endpoints {
    pub fn new(coingecko: &str, cryptoid: &str) -> Self {
        Self {
            coingecko: with_slash(coingecko),
            cryptoid: with_slash(cryptoid),
            mempool: with_slash(MEMPOOL_BASE_URL),
        }
    }

    pub fn with_mempool(mut self, base: &str) -> Self {
        self.mempool = with_slash(base);
        self
    }

    pub fn price_main(&self, asset: &str, quote: &str) -> String {
        format!(
            "{}coins/markets?ids={asset}&vs_currency={quote}\
             &page=1&sparkline=false&price_change_percentage=1h%2C24h%2C7d%2C30d",
            self.coingecko
        )
    }

    pub fn price_simple(&self, asset: &str, quote: &str) -> String {
        format!(
            "{}simple/price?ids={asset}&vs_currencies={quote}\
             &include_market_cap=true&include_24hr_vol=true&include_24hr_change=true\
             &include_last_updated_at=true",
            self.coingecko
        )
    }

    pub fn dominance(&self) -> String {
        format!("{}global", self.coingecko)
    }

    pub fn chain_summary(&self) -> String {
        format!("{}explorer/api.dws?q=summary", self.cryptoid)
    }

    pub fn chain_control(&self, asset: &str) -> String {
        format!("{}explorer/index.pools.dws?coin={asset}", self.cryptoid)
    }

    pub fn chain_orphans(&self, asset: &str) -> String {
        format!("{}explorer/index.orphans.dws?coin={asset}", self.cryptoid)
    }

    pub fn chain_block_time(&self, asset: &str, height: i64) -> String {
        format!("{}{asset}/api.dws?q=getblocktime&height={height}", self.cryptoid)
    }

    pub fn mempool_stats(&self) -> String {
        format!("{}mempool", self.mempool)
    }

    pub fn mempool_fees(&self) -> String {
        format!("{}v1/fees/recommended", self.mempool)
    }

    pub fn mempool_next_block(&self) -> String {
        format!("{}v1/fees/mempool-blocks", self.mempool)
    }

    /// `domain` may be a bare host (https is assumed) or a full base URL.
    pub fn nomp_pool_stats(&self, domain: &str) -> String {
        let domain = domain.trim().trim_end_matches('/');
        if domain.starts_with("http://") || domain.starts_with("https://") {
            format!("{domain}/api/stats")
        } else {
            format!("https://{domain}/api/stats")
        }
    }
}
