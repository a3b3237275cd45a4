use crate::models::courier::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Great-circle distance, used only for advisory display figures.
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lon = (delta_lon / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lon * sin_lon;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

#[cfg(test)]
mod tests {
    use super::haversine_km;
    use crate::models::courier::GeoPoint;

    #[test]
    fn courier_standing_at_the_pickup_reads_zero() {
        let pickup = GeoPoint {
            latitude: 48.8566,
            longitude: 2.3522,
        };
        let distance = haversine_km(&pickup, &pickup);
        assert!(distance < 1e-9);
    }

    #[test]
    fn chatelet_to_bastille_is_a_short_ride() {
        let courier = GeoPoint {
            latitude: 48.8583,
            longitude: 2.3470,
        };
        let dropoff = GeoPoint {
            latitude: 48.8530,
            longitude: 2.3694,
        };
        let distance = haversine_km(&courier, &dropoff);
        assert!((distance - 1.74).abs() < 0.05);
    }
}
