mod common;

use axum::http::StatusCode;
use common::{self_body, Platform, RouterPeer, ADMIN};
use serde_json::{json, Value};
use std::sync::Arc;

struct Pair {
    peer: Arc<RouterPeer>,
    s: Platform,
    p: Platform,
    s_fed: Value,
    p_fed: Value,
}

async fn two_platforms() -> Pair {
    let peer = Arc::new(RouterPeer::new());
    let s = Platform::new("s.example.com:9808", &peer);
    let p = Platform::new("p.example.com:9808", &peer);

    let (status, s_fed) = s
        .post(ADMIN, "/api/federator/self/create", self_body("mexop", "US", "US-1"))
        .await;
    assert_eq!(status, StatusCode::OK, "{s_fed}");
    let (status, p_fed) = p
        .post(ADMIN, "/api/federator/self/create", self_body("telco", "GB", "GB-1"))
        .await;
    assert_eq!(status, StatusCode::OK, "{p_fed}");

    let (status, zone) = s
        .post(
            ADMIN,
            "/api/federator/zone/create",
            json!({
                "operatorId": "mexop",
                "countryCode": "US",
                "zoneId": "zone-sfo",
                "geoLocation": "37.77,-122.41",
                "city": "San Francisco",
                "region": "US-1",
                "cloudlets": ["cloudlet1"],
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{zone}");

    Pair {
        peer,
        s,
        p,
        s_fed,
        p_fed,
    }
}

/// P asks to access the zones of S.
fn add_partner_body(s_fed: &Value) -> Value {
    json!({
        "selfOperatorId": "telco",
        "selfCountryCode": "GB",
        "partnerFederationId": s_fed["federationId"],
        "partnerFederationAddr": s_fed["federationAddr"],
        "partnerOperatorId": "mexop",
        "partnerCountryCode": "US",
    })
}

fn zone_pair() -> Value {
    json!({
        "selfOperatorId": "telco",
        "selfCountryCode": "GB",
        "partnerOperatorId": "mexop",
        "partnerCountryCode": "US",
        "zoneId": "zone-sfo",
    })
}

fn remove_partner_body() -> Value {
    json!({
        "selfOperatorId": "telco",
        "selfCountryCode": "GB",
        "partnerOperatorId": "mexop",
        "partnerCountryCode": "US",
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn partner_zone_lifecycle_over_http() {
    let Pair { s, p, s_fed, .. } = two_platforms().await;

    let (status, partner) = p
        .post(ADMIN, "/api/federator/partner/create", add_partner_body(&s_fed))
        .await;
    assert_eq!(status, StatusCode::OK, "{partner}");
    assert_eq!(partner["operatorId"], "mexop");
    assert_eq!(partner["kind"], "partner");
    assert_eq!(partner["locatorEndpoint"], "locator.mexop.example.com");

    let (status, zones) = p
        .post(ADMIN, "/api/federator/zone/partner/show", json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let zones = zones.as_array().unwrap();
    assert_eq!(zones.len(), 1);
    assert_eq!(zones[0]["zoneId"], "zone-sfo");
    assert_eq!(zones[0]["registered"], false);

    let (status, body) = p
        .post(ADMIN, "/api/federator/zone/register", zone_pair())
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, owned) = s.post(ADMIN, "/api/federator/zone/show", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(owned[0]["registeredBy"][0]["operatorId"], "telco");
    assert_eq!(owned[0]["sharedWith"][0]["countryCode"], "GB");

    // Registered zones pin both the zone and the partnership.
    let (status, _) = s
        .post(
            ADMIN,
            "/api/federator/zone/delete",
            json!({"operatorId": "mexop", "countryCode": "US", "zoneId": "zone-sfo"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = p
        .post(ADMIN, "/api/federator/partner/delete", remove_partner_body())
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = p
        .post(ADMIN, "/api/federator/zone/deregister", zone_pair())
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = p
        .post(ADMIN, "/api/federator/partner/delete", remove_partner_body())
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    assert_eq!(p.count("SELECT COUNT(*) FROM federators WHERE kind = 'partner'"), 0);
    assert_eq!(p.count("SELECT COUNT(*) FROM federator_zones"), 0);
    assert_eq!(s.count("SELECT COUNT(*) FROM federators WHERE kind = 'partner'"), 0);
    assert_eq!(s.count("SELECT COUNT(*) FROM federator_shared_zones"), 0);
    assert_eq!(s.count("SELECT COUNT(*) FROM federator_registered_zones"), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn inbound_calls_are_audited_with_the_peer_as_actor() {
    let Pair { s, p, s_fed, p_fed, .. } = two_platforms().await;

    let (status, _) = p
        .post(ADMIN, "/api/federator/partner/create", add_partner_body(&s_fed))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = s
        .get(
            ADMIN,
            "/api/federation/events?eventType=PARTNER_HANDSHAKE_ACCEPTED",
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    let event = &body["events"][0];
    assert_eq!(event["entity_id"], p_fed["federationId"]);
    assert_eq!(
        event["actor"],
        format!("peer:{}", p_fed["federationId"].as_str().unwrap())
    );

    let (status, body) = p
        .get(ADMIN, "/api/federation/events?eventType=PARTNER_ADDED")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["events"][0]["actor"], ADMIN);

    let (status, body) = s.get(ADMIN, "/api/federation/events?limit=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["events"][0]["event_type"], "FEDERATOR_CREATED");
}

#[tokio::test(flavor = "multi_thread")]
async fn share_and_update_reach_the_partner_over_http() {
    let Pair { s, p, s_fed, .. } = two_platforms().await;
    let (status, _) = p
        .post(ADMIN, "/api/federator/partner/create", add_partner_body(&s_fed))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = s
        .post(
            ADMIN,
            "/api/federator/self/update",
            json!({"operatorId": "mexop", "countryCode": "US", "mcc": "311"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["mcc"], "311");

    let (status, partners) = p.post(ADMIN, "/api/federator/partner/show", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(partners[0]["mcc"], "311");
    assert_eq!(partners[0]["roles"], json!(["AccessPartnerZones"]));

    // The handshake snapshot already shared zone-sfo; withdrawing it
    // removes P's shadow copy.
    let unshare = json!({
        "selfOperatorId": "mexop",
        "selfCountryCode": "US",
        "partnerOperatorId": "telco",
        "partnerCountryCode": "GB",
        "zoneId": "zone-sfo",
    });
    let (status, body) = s
        .post(ADMIN, "/api/federator/zone/unshare", unshare.clone())
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(p.count("SELECT COUNT(*) FROM federator_zones"), 0);

    let (status, _) = s.post(ADMIN, "/api/federator/zone/share", unshare).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(p.count("SELECT COUNT(*) FROM federator_zones"), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_partner_is_a_bad_gateway() {
    let Pair { peer, s, p, s_fed, .. } = two_platforms().await;
    peer.detach(&s.addr);

    let (status, body) = p
        .post(ADMIN, "/api/federator/partner/create", add_partner_body(&s_fed))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY, "{body}");
    assert_eq!(p.count("SELECT COUNT(*) FROM federators WHERE kind = 'partner'"), 0);
    assert_eq!(
        p.count("SELECT COUNT(*) FROM federation_intents WHERE status = 'aborted'"),
        1
    );
}
