use crate::catalog::City;

const EMBED_ENDPOINT: &str = "https://www.openstreetmap.org/export/embed.html";

/// `[min_lon, min_lat, max_lon, max_lat]`, one degree around the city.
pub fn bounding_box(city: &City) -> [f64; 4] {
    [
        city.longitude - 1.0,
        city.latitude - 1.0,
        city.longitude + 1.0,
        city.latitude + 1.0,
    ]
}

pub fn embed_url(city: &City) -> String {
    let [min_lon, min_lat, max_lon, max_lat] = bounding_box(city);
    format!(
        "{EMBED_ENDPOINT}?bbox={min_lon:.4}%2C{min_lat:.4}%2C{max_lon:.4}%2C{max_lat:.4}&layer=mapnik&marker={:.4},{:.4}",
        city.latitude, city.longitude
    )
}
