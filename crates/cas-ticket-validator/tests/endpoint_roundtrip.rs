#![allow(unused_crate_dependencies)]
#![allow(clippy::unwrap_used)]

use cas_ticket_validator::{CasServerUrl, Protocol};
use proptest::prelude::*;
use url::Url;

fn cas_url() -> impl Strategy<Value = CasServerUrl> {
    ("(http|https)", "[a-z]{1,10}\\.example\\.org", "(/[a-z]{1,8}){0,2}/?")
        .prop_map(|(scheme, host, path)| format!("{scheme}://{host}{path}").parse().unwrap())
}

fn service_url() -> impl Strategy<Value = Url> {
    (
        "[a-z]{1,10}\\.example\\.com",
        "(/[a-zA-Z0-9._~-]{1,8}){0,3}",
        proptest::option::of("[a-z]{1,5}=[a-zA-Z0-9 &/+%]{0,10}"),
        proptest::option::of("[a-zA-Z0-9/]{0,10}"),
    )
        .prop_map(|(host, path, query, fragment)| {
            let mut url = Url::parse(&format!("https://{host}{path}")).unwrap();
            if let Some((key, value)) = query.as_deref().and_then(|q| q.split_once('=')) {
                url.query_pairs_mut().append_pair(key, value);
            }
            if let Some(fragment) = fragment {
                url.set_fragment(Some(&fragment));
            }
            url
        })
}

fn ticket() -> impl Strategy<Value = String> {
    "[ -~]{1,40}"
}

fn protocol() -> impl Strategy<Value = Protocol> {
    prop_oneof![Just(Protocol::Cas1), Just(Protocol::Cas2)]
}

proptest! {
    #[test]
    fn query_round_trips(cas in cas_url(), service in service_url(), ticket in ticket(), protocol in protocol()) {
        let endpoint = cas.endpoint(protocol, &service, &ticket);

        let pairs: Vec<(String, String)> = endpoint
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let mut expected_service = service.clone();
        expected_service.set_fragment(None);

        prop_assert_eq!(pairs.len(), 2);
        prop_assert_eq!(&pairs[0].0, "service");
        prop_assert_eq!(&pairs[0].1, expected_service.as_str());
        prop_assert_eq!(&pairs[1].0, "ticket");
        prop_assert_eq!(&pairs[1].1, &ticket);
        prop_assert!(!pairs[0].1.contains('#'));
        prop_assert_eq!(endpoint.fragment(), None);
    }

    #[test]
    fn endpoint_stays_under_cas_path(cas in cas_url(), service in service_url(), protocol in protocol()) {
        let endpoint = cas.endpoint(protocol, &service, "ST-1");

        let prefix = cas.as_url().path().trim_end_matches('/');
        prop_assert_eq!(endpoint.path(), format!("{prefix}/{}", protocol.path_segment()));
        prop_assert_eq!(endpoint.host_str(), cas.as_url().host_str());
        prop_assert_eq!(endpoint.scheme(), cas.as_url().scheme());
    }
}
