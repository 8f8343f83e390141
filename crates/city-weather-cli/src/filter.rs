use crate::catalog::City;

/// Cities whose name or country contains `query`, ignoring case.
///
/// Catalog order is kept. An empty query returns every city.
pub fn filter_cities<'a>(cities: &'a [City], query: &str) -> Vec<&'a City> {
    if query.is_empty() {
        return cities.iter().collect();
    }

    let needle = query.to_lowercase();
    cities
        .iter()
        .filter(|city| {
            city.name.to_lowercase().contains(&needle)
                || city.country.to_lowercase().contains(&needle)
        })
        .collect()
}
