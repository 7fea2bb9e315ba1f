//! Badge membership lookup and tagging.

use std::collections::HashSet;

use alloy_primitives::Address;
use futures::future::join_all;
use tracing::{debug, info, instrument};

use tokenlist_shared::{BadgeConfig, Result, TokenRecord};

use crate::sources::BadgeSource;

/// Badge tag key with the addresses currently holding the badge.
pub type BadgeMembers = (String, HashSet<Address>);

/// Query every configured badge registry concurrently.
///
/// Badges without a contract address are skipped. The result keeps
/// configuration order regardless of which query finishes first. Any failed
/// query fails the whole lookup.
#[instrument(skip_all, fields(badges = badges.len()))]
pub async fn fetch_badges(
    source: &dyn BadgeSource,
    badges: &[BadgeConfig],
) -> Result<Vec<BadgeMembers>> {
    let queried: Vec<(&str, Address)> = badges
        .iter()
        .filter_map(|b| b.address.map(|addr| (b.key.as_str(), addr)))
        .collect();

    let results = join_all(
        queried
            .iter()
            .map(|(_, address)| source.addresses_with_badge(*address)),
    )
    .await;

    let mut members = Vec::with_capacity(queried.len());
    for ((key, _), result) in queried.into_iter().zip(results) {
        let addresses = result?;
        debug!(badge = key, holders = addresses.len(), "badge members loaded");
        members.push((key.to_string(), addresses));
    }
    Ok(members)
}

/// Append each badge's tag to the tokens holding it. Returns the number of
/// tags added; running it twice adds nothing the second time.
pub fn apply_badges(tokens: &mut [TokenRecord], members: &[BadgeMembers]) -> usize {
    let mut added = 0;
    for (key, addresses) in members {
        for token in tokens.iter_mut() {
            if addresses.contains(&token.address) && token.add_tag(key) {
                added += 1;
            }
        }
    }
    info!(added, "badge tags applied");
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBadges, token};

    fn badge(key: &str, byte: Option<u8>) -> BadgeConfig {
        BadgeConfig {
            key: key.into(),
            name: key.into(),
            description: format!("{key} badge"),
            address: byte.map(Address::repeat_byte),
        }
    }

    #[tokio::test]
    async fn members_follow_config_order_and_skip_unaddressed() {
        let source = FakeBadges::default()
            .with_badge(Address::repeat_byte(0xb1), &[1, 2])
            .with_badge(Address::repeat_byte(0xb2), &[2]);
        let config = vec![
            badge("stablecoin", Some(0xb2)),
            badge("dutchX", None),
            badge("erc20", Some(0xb1)),
        ];

        let members = fetch_badges(&source, &config).await.unwrap();
        let keys: Vec<_> = members.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["stablecoin", "erc20"]);
        assert_eq!(members[1].1.len(), 2);
    }

    #[tokio::test]
    async fn failed_badge_query_is_an_error() {
        let source = FakeBadges::default();
        let err = fetch_badges(&source, &[badge("erc20", Some(0xb1))])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unreachable"));
    }

    #[test]
    fn tagging_is_idempotent_and_keeps_existing_order() {
        let mut tokens = vec![token(1, "AAA", Some(18)), token(2, "BBB", Some(6))];
        tokens[1].tags = vec!["stablecoin".into()];

        let members = vec![
            (
                "erc20".to_string(),
                HashSet::from([Address::repeat_byte(1), Address::repeat_byte(2)]),
            ),
            ("stablecoin".to_string(), HashSet::from([Address::repeat_byte(2)])),
        ];

        assert_eq!(apply_badges(&mut tokens, &members), 2);
        let once = tokens.clone();
        assert_eq!(apply_badges(&mut tokens, &members), 0);
        assert_eq!(tokens, once);

        assert_eq!(tokens[0].tags, vec!["erc20"]);
        assert_eq!(tokens[1].tags, vec!["stablecoin", "erc20"]);
    }
}
