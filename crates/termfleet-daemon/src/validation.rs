//! Input validation for registration requests

const NAME_MIN_LEN: usize = 3;
const NAME_MAX_LEN: usize = 63;

/// Check a workstation name: a single DNS label of 3 to 63 characters,
/// alphanumeric at both ends with hyphens allowed inside.
pub fn validate_workstation_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Name is required and must be a string".to_string());
    }

    if name.len() < NAME_MIN_LEN || name.len() > NAME_MAX_LEN {
        return Err(format!(
            "Name must be between {} and {} characters",
            NAME_MIN_LEN, NAME_MAX_LEN
        ));
    }

    let bytes = name.as_bytes();
    let edges_ok =
        bytes[0].is_ascii_alphanumeric() && bytes[bytes.len() - 1].is_ascii_alphanumeric();
    let body_ok = bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-');

    if !edges_ok || !body_ok {
        return Err(
            "Name must start and end with alphanumeric characters and can contain hyphens"
                .to_string(),
        );
    }

    Ok(())
}

/// Check a dotted-quad IPv4 address
pub fn validate_ipv4(ip: &str) -> Result<(), String> {
    if ip.is_empty() {
        return Err("IP address is required and must be a string".to_string());
    }

    let octets: Vec<&str> = ip.split('.').collect();
    let well_formed = octets.len() == 4
        && octets
            .iter()
            .all(|o| (1..=3).contains(&o.len()) && o.bytes().all(|b| b.is_ascii_digit()));
    if !well_formed {
        return Err("Invalid IPv4 address format".to_string());
    }

    if octets.iter().any(|o| o.parse::<u16>().map_or(true, |v| v > 255)) {
        return Err("IPv4 address octets must be between 0 and 255".to_string());
    }

    Ok(())
}

/// Validate both fields of a registration, name first
pub fn validate_registration(name: &str, ip: &str) -> Result<(), String> {
    validate_workstation_name(name)?;
    validate_ipv4(ip)
}
