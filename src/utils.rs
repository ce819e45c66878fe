//! Identifier minting

use bech32::Bech32m;
use uuid7::uuid7;

// time-ordered uuid encoded with bech32 under the resource kind as prefix
pub fn new_resource_id(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_carry_their_kind() {
        let id = new_resource_id("consent").unwrap();
        let (hrp, data) = bech32::decode(&id).unwrap();

        assert!(id.starts_with("consent1"));
        assert_eq!(hrp.as_str(), "consent");
        assert_eq!(data.len(), 16);
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(
            new_resource_id("authorisation").unwrap(),
            new_resource_id("authorisation").unwrap()
        );
    }
}
