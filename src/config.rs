use clap::Parser;
use crate::geocoding::geocoder::GeocoderConfig;

#[derive(Parser, Clone, Debug)]
pub struct Config {
    #[clap(env, long)]
    pub environment: String,

    #[clap(env, long)]
    pub database_url: String,

    /// Comma separated list of origins allowed by CORS
    #[clap(env, long, default_value = "http://localhost:3000")]
    pub origin_urls: String,

    #[clap(env, long, default_value_t = 3000)]
    pub port: u16,

    /// Defaults to the number of logical cpus
    #[clap(env, long)]
    pub max_pool_size: Option<u32>,

    #[clap(env, long)]
    pub geocoder_api_key: String,

    #[clap(env, long, default_value = "https://geocode-maps.yandex.ru/1.x")]
    pub geocoder_base_url: String,

    /// Bearer token guarding the back-office endpoints
    #[clap(env, long)]
    pub manager_token: String,

    #[clap(env, long, default_value = "/media/")]
    pub media_url: String,

    #[clap(env, long, default_value = "/static/")]
    pub static_url: String,
}

impl Config {
    pub fn pool_size(&self) -> u32 {
        self.max_pool_size
            .unwrap_or_else(|| num_cpus::get() as u32)
            .max(1)
    }

    pub fn geocoder_config(&self) -> GeocoderConfig {
        GeocoderConfig {
            base_url: self.geocoder_base_url.clone(),
            api_key: self.geocoder_api_key.clone(),
        }
    }
}
