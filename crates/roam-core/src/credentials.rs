//! Dotenv-style credential file (`KEY=VALUE`, one per line).
//!
//! Single-process, single-writer: no locking. Writes go to a sibling temp file
//! and are renamed over the target.

use std::{
    collections::BTreeMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use crate::{
    domain::{Credentials, TokenScheme, UserId},
    errors::Error,
    Result,
};

pub const PHONE_NUMBER: &str = "PHONE_NUMBER";
pub const ACCESS_TOKEN: &str = "ACCESS_TOKEN";
pub const REFRESH_TOKEN: &str = "REFRESH_TOKEN";
pub const AUTH_TOKEN: &str = "AUTH_TOKEN";
pub const USER_ID: &str = "USER_ID";
pub const DEVICE_ID: &str = "DEVICE_ID";

pub type EnvMap = BTreeMap<String, String>;

#[derive(Clone, Debug)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every pair. A missing file is an empty map.
    pub fn load(&self) -> Result<EnvMap> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(parse_dotenv(&contents).into_iter().collect()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(EnvMap::new()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Replace the whole file with `map`.
    pub fn write(&self, map: &EnvMap) -> Result<()> {
        let mut tmp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| ".env".into());
        tmp_name.push(format!(".tmp-{}", std::process::id()));
        let tmp = self.path.with_file_name(tmp_name);

        fs::write(&tmp, render_dotenv(map))?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(Error::Io(e));
        }
        Ok(())
    }

    /// Merge `pairs` into the stored map; untouched keys are preserved.
    pub fn update<K, V>(&self, pairs: impl IntoIterator<Item = (K, V)>) -> Result<EnvMap>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = self.load()?;
        for (k, v) in pairs {
            map.insert(k.into(), v.into());
        }
        self.write(&map)?;
        Ok(map)
    }

    /// `PHONE_NUMBER` from the file, falling back to the process env.
    pub fn phone_number(&self) -> Result<String> {
        let map = self.load()?;
        map.get(PHONE_NUMBER)
            .cloned()
            .or_else(|| std::env::var(PHONE_NUMBER).ok())
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| Error::Credentials(format!("{PHONE_NUMBER} is not set")))
    }

    /// Stored `DEVICE_ID`, or a fresh one when none is stored yet.
    ///
    /// Read-only: a fresh id reaches the file with the next token write.
    pub fn device_id(&self) -> Result<String> {
        if let Some(id) = self.load()?.get(DEVICE_ID).filter(|v| !v.is_empty()) {
            return Ok(id.clone());
        }
        Ok(uuid::Uuid::new_v4().to_string().to_uppercase())
    }

    /// Build the session credentials for `scheme` from the stored pairs.
    pub fn credentials(&self, scheme: TokenScheme) -> Result<Credentials> {
        credentials_from_map(&self.load()?, scheme)
    }
}

pub fn credentials_from_map(map: &EnvMap, scheme: TokenScheme) -> Result<Credentials> {
    let required = |key: &str| {
        map.get(key)
            .filter(|v| !v.trim().is_empty())
            .cloned()
            .ok_or_else(|| Error::Credentials(format!("{key} is missing; run the auth action")))
    };

    let raw_user_id = required(USER_ID)?;
    let user_id = raw_user_id
        .trim()
        .parse::<i64>()
        .map(UserId)
        .map_err(|_| Error::Credentials(format!("{USER_ID} is not numeric: `{raw_user_id}`")))?;

    let (access_token, refresh_token) = match scheme {
        TokenScheme::Bearer => (required(ACCESS_TOKEN)?, Some(required(REFRESH_TOKEN)?)),
        TokenScheme::Token => (required(AUTH_TOKEN)?, None),
    };

    Ok(Credentials {
        user_id,
        scheme,
        access_token,
        refresh_token,
        device_id: map.get(DEVICE_ID).cloned(),
    })
}

/// Parse dotenv text into ordered pairs. Later duplicates win when collected.
pub fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        out.push((key.to_string(), unquote(v.trim())));
    }
    out
}

fn unquote(val: &str) -> String {
    if val.len() >= 2 && val.starts_with('\'') && val.ends_with('\'') {
        return val[1..val.len() - 1].to_string();
    }
    if val.len() >= 2 && val.starts_with('"') && val.ends_with('"') {
        let inner = &val[1..val.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        }
        return out;
    }
    // Unquoted: drop a trailing ` # comment`.
    match val.find(" #") {
        Some(idx) => val[..idx].trim_end().to_string(),
        None => val.to_string(),
    }
}

/// Render pairs sorted by key; integers bare, everything else double-quoted.
pub fn render_dotenv(map: &EnvMap) -> String {
    let mut out = String::new();
    for (k, v) in map {
        if !v.is_empty() && v.parse::<i64>().is_ok() {
            out.push_str(&format!("{k}={v}\n"));
        } else {
            let escaped = v
                .replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('\n', "\\n");
            out.push_str(&format!("{k}=\"{escaped}\"\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}.env"))
    }

    #[test]
    fn parses_quotes_comments_and_export() {
        let pairs = parse_dotenv(
            "# session\nexport PHONE_NUMBER=+15550100\nACCESS_TOKEN=\"a\\\"b\"\n\nUSER_ID=7 # me\nNAME='x y'\nbroken line\n",
        );
        assert_eq!(
            pairs,
            vec![
                ("PHONE_NUMBER".to_string(), "+15550100".to_string()),
                ("ACCESS_TOKEN".to_string(), "a\"b".to_string()),
                ("USER_ID".to_string(), "7".to_string()),
                ("NAME".to_string(), "x y".to_string()),
            ]
        );
    }

    #[test]
    fn missing_file_loads_empty() {
        let store = CredentialStore::new(tmp("roam-missing"));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn write_then_load_preserves_values() {
        let path = tmp("roam-store");
        let store = CredentialStore::new(&path);
        let mut map = EnvMap::new();
        map.insert(USER_ID.into(), "42".into());
        map.insert(ACCESS_TOKEN.into(), "tok \"quoted\"".into());
        store.write(&map).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("ACCESS_TOKEN=\""));
        assert!(text.contains("USER_ID=42\n"));
        assert_eq!(store.load().unwrap(), map);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn update_keeps_other_keys() {
        let path = tmp("roam-update");
        fs::write(&path, "A=1\nB=\"two\"\nACCESS_TOKEN=old\n").unwrap();
        let store = CredentialStore::new(&path);

        store
            .update([(ACCESS_TOKEN, "new"), (REFRESH_TOKEN, "r2")])
            .unwrap();

        let map = store.load().unwrap();
        assert_eq!(map.get("A").map(String::as_str), Some("1"));
        assert_eq!(map.get("B").map(String::as_str), Some("two"));
        assert_eq!(map.get(ACCESS_TOKEN).map(String::as_str), Some("new"));
        assert_eq!(map.get(REFRESH_TOKEN).map(String::as_str), Some("r2"));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn device_id_lookup_never_writes() {
        let path = tmp("roam-device");
        fs::write(&path, "PHONE_NUMBER=+15550100\n").unwrap();
        let store = CredentialStore::new(&path);

        let fresh = store.device_id().unwrap();
        assert_eq!(fresh.len(), 36);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "PHONE_NUMBER=+15550100\n"
        );

        store.update([(DEVICE_ID, "KEPT")]).unwrap();
        assert_eq!(store.device_id().unwrap(), "KEPT");
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn credentials_require_numeric_user_id() {
        let mut map = EnvMap::new();
        map.insert(USER_ID.into(), "abc".into());
        map.insert(AUTH_TOKEN.into(), "t".into());
        assert!(matches!(
            credentials_from_map(&map, TokenScheme::Token),
            Err(Error::Credentials(_))
        ));

        map.insert(USER_ID.into(), "9".into());
        let creds = credentials_from_map(&map, TokenScheme::Token).unwrap();
        assert_eq!(creds.user_id, UserId(9));
        assert_eq!(creds.access_token, "t");
        assert_eq!(creds.refresh_token, None);

        assert!(matches!(
            credentials_from_map(&map, TokenScheme::Bearer),
            Err(Error::Credentials(_))
        ));
    }
}
