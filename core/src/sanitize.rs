use crate::asset::hash_str;

/// CloudFormation caps logical IDs at 255 chars, the hash suffix takes 8 of them
const MAX_HUMAN_PART: usize = 240;

/// Logical ID of a resource out of its construct path
///
/// Keeps only alphanumeric chars of every path component and appends a short hash of the
/// full path, so that "A/BC" and "AB/C" never collide.
pub fn logical_id(path: &[&str]) -> String {
    let mut human: String = path
        .iter()
        .flat_map(|component| component.chars())
        .filter(char::is_ascii_alphanumeric)
        .collect();

    human.truncate(MAX_HUMAN_PART);
    let hash = hash_str(&path.join("/"))[..8].to_uppercase();
    format!("{human}{hash}")
}

/// Replace any char not allowed in an ECR repository name
pub fn escape_repository_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '-' | '_' | '.' | '/' => c,
            _ => '-',
        })
        .collect()
}
