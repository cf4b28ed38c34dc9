use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use rand::{thread_rng, RngCore};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Client side of a SCRAM-SHA-256 exchange (RFC 7677) without channel
/// binding.
#[derive(Debug, Clone)]
pub struct ScramClient {
    password: String,
    nonce: String,
    client_first_bare: String,
}

/// What the client expects the server to prove in its final message.
#[derive(Debug, Clone)]
pub struct ServerProof(Vec<u8>);

impl ScramClient {
    pub fn new(user: &str, password: &str) -> Self {
        let mut raw = [0u8; 18];
        thread_rng().fill_bytes(&mut raw);
        ScramClient::with_nonce(user, password, &STANDARD.encode(raw))
    }

    pub fn with_nonce(user: &str, password: &str, nonce: &str) -> Self {
        let user = user.replace('=', "=3D").replace(',', "=2C");
        ScramClient {
            password: password.to_string(),
            nonce: nonce.to_string(),
            client_first_bare: format!("n={user},r={nonce}"),
        }
    }

    pub fn client_first(&self) -> String {
        format!("n,,{}", self.client_first_bare)
    }

    /// Answers the server's challenge. Returns the client-final message and
    /// the signature the server has to send back.
    pub fn client_final(&self, server_first: &str) -> Result<(String, ServerProof)> {
        let mut nonce = None;
        let mut salt = None;
        let mut iterations = None;
        for attribute in server_first.split(',') {
            match attribute.split_once('=') {
                Some(("r", value)) => nonce = Some(value),
                Some(("s", value)) => salt = Some(value),
                Some(("i", value)) => iterations = Some(value),
                _ => {}
            }
        }

        let nonce = nonce.ok_or_else(|| Error::Auth("challenge without nonce".into()))?;
        if !nonce.starts_with(&self.nonce) {
            return Err(Error::Auth("server nonce does not extend ours".into()));
        }
        let salt = STANDARD
            .decode(salt.ok_or_else(|| Error::Auth("challenge without salt".into()))?)
            .map_err(|err| Error::Auth(format!("bad salt: {err}")))?;
        let iterations: u32 = iterations
            .ok_or_else(|| Error::Auth("challenge without iteration count".into()))?
            .parse()
            .map_err(|err| Error::Auth(format!("bad iteration count: {err}")))?;

        let mut salted_password = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(
            self.password.as_bytes(),
            &salt,
            iterations,
            &mut salted_password,
        );

        let client_final_bare = format!("c=biws,r={nonce}");
        let auth_message = format!(
            "{},{},{}",
            self.client_first_bare, server_first, client_final_bare
        );

        let client_key = hmac(&salted_password, b"Client Key")?;
        let stored_key = Sha256::digest(&client_key);
        let client_signature = hmac(&stored_key, auth_message.as_bytes())?;
        let proof: Vec<u8> = client_key
            .iter()
            .zip(client_signature.iter())
            .map(|(key, signature)| key ^ signature)
            .collect();

        let server_key = hmac(&salted_password, b"Server Key")?;
        let server_signature = hmac(&server_key, auth_message.as_bytes())?;

        Ok((
            format!("{client_final_bare},p={}", STANDARD.encode(proof)),
            ServerProof(server_signature),
        ))
    }
}

impl ServerProof {
    pub fn verify(&self, server_final: &str) -> Result<()> {
        let signature = server_final
            .split(',')
            .find_map(|attribute| attribute.strip_prefix("v="))
            .ok_or_else(|| Error::Auth("final message without signature".into()))?;
        let signature = STANDARD
            .decode(signature)
            .map_err(|err| Error::Auth(format!("bad server signature: {err}")))?;
        if signature != self.0 {
            return Err(Error::Auth("server signature mismatch".into()));
        }
        Ok(())
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|err| Error::Auth(format!("hmac key: {err}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}
