/*  Copyright 2022-23, Juspay India Pvt Ltd
    This program is free software: you can redistribute it and/or modify it under the terms of the GNU Affero General Public License
    as published by the Free Software Foundation, either version 3 of the License, or (at your option) any later version. This program
    is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
    or FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more details. You should have received a copy of
    the GNU Affero General Public License along with this program. If not, see <https://www.gnu.org/licenses/>.
*/

#[cfg(test)]
mod http {
    use actix_web::{
        http::StatusCode,
        test,
        web::{self, Data},
        App,
    };
    use chrono::Utc;
    use driver_location_service::{
        domain::api,
        environment::{AppConfig, AppState},
        tools::{
            error::AppError,
            logger::{LogLevel, LoggerConfig},
        },
        tracker::TrackerConfig,
    };
    use serde_json::{json, Value};

    fn app_state() -> AppState {
        AppState::new(AppConfig {
            port: 8081,
            workers: 1,
            logger_cfg: LoggerConfig {
                level: LogLevel::OFF,
                log_to_file: false,
            },
            tracker_cfg: TrackerConfig::default(),
            reaper_interval: 30,
            request_timeout: 9000,
            max_allowed_req_size: 512_000,
        })
        .expect("valid app config")
    }

    fn ping(driver_id: i64, lat: f64, lon: f64, timestamp: i64) -> Value {
        json!({
            "timestamp": timestamp,
            "driver_id": driver_id,
            "location": { "lat": lat, "lon": lon }
        })
    }

    #[actix_web::test]
    async fn update_then_locate() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(app_state()))
                .configure(api::handler),
        )
        .await;
        let now = Utc::now().timestamp();

        let req = test::TestRequest::post()
            .uri("/driver/location")
            .set_json(ping(7, 10.0, 20.0, now))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], json!(true));

        let req = test::TestRequest::get().uri("/driver/7").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["driver"], json!(7));

        let req = test::TestRequest::get()
            .uri("/internal/driver/7/location")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["driverId"], json!(7));
        assert_eq!(body["lat"], json!(10.0));
        assert_eq!(body["lon"], json!(20.0));
        assert_eq!(body["timestamp"], json!(now));
    }

    #[actix_web::test]
    async fn stale_update_reports_failure_without_error_status() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(app_state()))
                .configure(api::handler),
        )
        .await;
        let now = Utc::now().timestamp();

        let req = test::TestRequest::post()
            .uri("/driver/location")
            .set_json(ping(5, 1.0, 1.0, now))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::post()
            .uri("/driver/location")
            .set_json(ping(5, 2.0, 2.0, now - 10))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], json!(false));

        let req = test::TestRequest::get()
            .uri("/internal/driver/5/location")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["lat"], json!(1.0));
    }

    #[actix_web::test]
    async fn invalid_payload_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(app_state()))
                .configure(api::handler),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/driver/location")
            .set_json(ping(3, 91.0, 0.0, Utc::now().timestamp()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["errorCode"], json!("INVALID_PAYLOAD"));

        let req = test::TestRequest::get().uri("/internal/stats").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["liveDrivers"], json!(0));
    }

    #[actix_web::test]
    async fn malformed_json_is_unprocessable() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(app_state()))
                .app_data(
                    web::JsonConfig::default().error_handler(|err, _| {
                        AppError::UnprocessibleRequest(err.to_string()).into()
                    }),
                )
                .configure(api::handler),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/driver/location")
            .set_json(json!({ "driver_id": 1 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[actix_web::test]
    async fn unknown_driver_is_reported_as_driver_response() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(app_state()))
                .configure(api::handler),
        )
        .await;

        let req = test::TestRequest::get().uri("/driver/99").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["driver"], json!(99));
        assert_eq!(body["message"], json!("Driver not found : DriverId - 99"));

        let req = test::TestRequest::get()
            .uri("/internal/driver/99/location")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["errorCode"], json!("UNKNOWN_DRIVER"));
    }

    #[actix_web::test]
    async fn future_timestamp_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(app_state()))
                .configure(api::handler),
        )
        .await;
        let now = Utc::now().timestamp();

        let req = test::TestRequest::post()
            .uri("/driver/location")
            .set_json(ping(4, 1.0, 1.0, now * 1000))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["errorCode"], json!("INVALID_PAYLOAD"));

        let req = test::TestRequest::post()
            .uri("/driver/location")
            .set_json(ping(4, 1.0, 1.0, now))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], json!(true));
    }

    #[actix_web::test]
    async fn nearest_drivers_in_order() {
        let app = test::init_service(
            App::new()
                .app_data(Data::new(app_state()))
                .configure(api::handler),
        )
        .await;
        let now = Utc::now().timestamp();

        for (driver_id, lat, lon) in [(1, 0.0, 0.0), (2, 0.0, 1.0), (3, 5.0, 5.0)] {
            let req = test::TestRequest::post()
                .uri("/driver/location")
                .set_json(ping(driver_id, lat, lon, now))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert!(resp.status().is_success());
        }

        let req = test::TestRequest::get()
            .uri("/drivers/nearest?lat=0&lon=0.1&k=2")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["drivers"], json!([1, 2]));

        let req = test::TestRequest::get()
            .uri("/drivers/nearest?lat=10&lon=10")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["drivers"], json!([3, 2, 1]));

        let req = test::TestRequest::get().uri("/healthcheck").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["result"], json!("Service Is Up, tracking 3 drivers"));
    }
}
