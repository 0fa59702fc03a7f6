//! Envelope codec: maps typed messages to and from wire headers and body.
//!
//! Decoding reads the discriminator header, selects the schema of that
//! variant and maps the declared headers and body slices into fields,
//! coercing header strings into the declared types. When the caller supplies
//! the set of variants the current protocol state accepts, any other
//! discriminator is rejected before field mapping takes place.

use std::str::FromStr;

use crate::definitions::ErrorCode;
use crate::x509::{chain, CertificateChain};

use super::message::*;
use super::{HttpReceiver, HttpTransmitter, MessageType, ProtocolMessage, HEADER_PREFIX, TYPE_HEADER};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("missing message type header")]
    MissingType,
    #[error("unknown message type {0:?}")]
    UnknownType(String),
    #[error("message type {0} not acceptable in the current protocol state")]
    UnexpectedType(MessageType),
    #[error("missing mandatory header {0}")]
    MissingHeader(String),
    #[error("header {header} carries invalid value {value:?}: {reason}")]
    InvalidHeader {
        header: String,
        value: String,
        reason: String,
    },
    #[error("missing message body")]
    MissingBody,
    #[error("message body error: {0}")]
    Body(String),
    #[error("message body framing error: {0}")]
    Framing(String),
    #[error(transparent)]
    Chain(#[from] chain::Error),
}

/// Decode one message from the transport request.
///
/// `expected` is the set of variants the current protocol state legally
/// accepts; a discriminator outside that set is rejected up front.
pub fn decode<R: HttpReceiver>(
    receiver: &R,
    expected: Option<&[MessageType]>,
) -> Result<ProtocolMessage, Error> {
    let discriminator = receiver.header_value(TYPE_HEADER).ok_or(Error::MissingType)?;
    let message_type =
        MessageType::from_str(&discriminator).map_err(|_| Error::UnknownType(discriminator))?;
    if let Some(expected) = expected {
        if !expected.contains(&message_type) {
            return Err(Error::UnexpectedType(message_type));
        }
    }
    tracing::debug!("decoding {message_type}");

    let headers = Headers { receiver };
    match message_type {
        MessageType::Hello => Ok(HelloMessage {
            language: headers.optional("Language"),
            request_id: headers.require("RequestId")?,
        }
        .into()),
        MessageType::CheckClient => Ok(CheckClientMessage.into()),
        MessageType::ClientEnvironment => Ok(ClientEnvironmentMessage {
            client_version: headers.require("ClientVersion")?,
            os_name: headers.require("OsName")?,
            os_arch: headers.require("OsArch")?,
            os_version: headers.require("OsVersion")?,
            readers: decode_reader_list(receiver.body())?,
        }
        .into()),
        MessageType::IdentificationRequest => Ok(IdentificationRequestMessage {
            include_address: headers.require_bool("IncludeAddress")?,
            include_photo: headers.require_bool("IncludePhoto")?,
            include_certificates: headers.require_bool("IncludeCerts")?,
        }
        .into()),
        MessageType::AuthenticationRequest => Ok(AuthenticationRequestMessage {
            challenge: headers.require_body()?.to_vec(),
        }
        .into()),
        MessageType::Administration => Ok(AdministrationMessage {
            change_pin: headers.require_bool("ChangePin")?,
            unblock_pin: headers.require_bool("UnblockPin")?,
        }
        .into()),
        MessageType::SignRequest => Ok(SignRequestMessage {
            digest_algo: headers.require("DigestAlgo")?,
            description: headers.optional("Description"),
            digest_value: headers.require_body()?.to_vec(),
        }
        .into()),
        MessageType::FilesDigestRequest => Ok(FilesDigestRequestMessage {
            digest_algo: headers.require("DigestAlgo")?,
        }
        .into()),
        MessageType::SignCertificatesRequest => Ok(SignCertificatesRequestMessage.into()),
        MessageType::FileDigestsData => Ok(FileDigestsDataMessage {
            digest_algo: headers.require("DigestAlgo")?,
            file_digests: headers.require_body()?.to_vec(),
        }
        .into()),
        MessageType::SignCertificatesData => {
            let sign_size = headers.require_usize("SignCertFileSize")?;
            let ca_size = headers.require_usize("CaCertFileSize")?;
            let root_size = headers.require_usize("RootCaCertFileSize")?;
            let body = headers.require_body()?;
            Ok(SignCertificatesDataMessage {
                certificate_chain: CertificateChain::split(body, &[sign_size, ca_size, root_size])?,
            }
            .into())
        }
        MessageType::IdentityData => decode_identity_data(&headers),
        MessageType::SignatureData => {
            let signature_size = headers.require_usize("SignatureValueSize")?;
            let sign_size = headers.require_usize("SignCertFileSize")?;
            let ca_size = headers.require_usize("CaCertFileSize")?;
            let root_size = headers.require_usize("RootCaCertFileSize")?;
            let body = headers.require_body()?;
            let mut reader = BodyReader::new(body);
            let signature_value = reader.take(signature_size, "signature value")?.to_vec();
            let certificate_chain =
                CertificateChain::split(reader.rest(), &[sign_size, ca_size, root_size])?;
            Ok(SignatureDataMessage {
                signature_value,
                certificate_chain,
            }
            .into())
        }
        MessageType::Finished => {
            let error_code = match headers.optional("ErrorCode") {
                None => None,
                Some(value) => Some(ErrorCode::from_str(&value).map_err(|_| {
                    Error::InvalidHeader {
                        header: "ErrorCode".to_string(),
                        value,
                        reason: "not a known error code".to_string(),
                    }
                })?),
            };
            Ok(FinishedMessage { error_code }.into())
        }
    }
}

fn decode_identity_data<R: HttpReceiver>(headers: &Headers<'_, R>) -> Result<ProtocolMessage, Error> {
    let identity_size = headers.require_usize("IdentityFileSize")?;
    let address_size = headers.optional_usize("AddressFileSize")?;
    let photo_size = headers.optional_usize("PhotoFileSize")?;
    let identity_signature_size = headers.optional_usize("IdentitySignatureFileSize")?;
    let address_signature_size = headers.optional_usize("AddressSignatureFileSize")?;
    let authn_cert_size = headers.optional_usize("AuthnCertFileSize")?;
    let sign_cert_size = headers.optional_usize("SignCertFileSize")?;
    let ca_cert_size = headers.optional_usize("CaCertFileSize")?;
    let root_cert_size = headers.optional_usize("RootCertFileSize")?;
    let rrn_cert_size = headers.optional_usize("RrnCertFileSize")?;

    let body = headers.require_body()?;
    let mut reader = BodyReader::new(body);
    let identity_file = reader.take(identity_size, "identity file")?.to_vec();
    let address_file = reader.take_optional(address_size, "address file")?;
    let photo_file = reader.take_optional(photo_size, "photo file")?;
    let identity_signature_file =
        reader.take_optional(identity_signature_size, "identity signature file")?;
    let address_signature_file =
        reader.take_optional(address_signature_size, "address signature file")?;
    let authn_cert_file = reader.take_optional(authn_cert_size, "authentication certificate")?;
    let sign_cert_file = reader.take_optional(sign_cert_size, "signing certificate")?;
    let ca_cert_file = reader.take_optional(ca_cert_size, "CA certificate")?;
    let root_cert_file = reader.take_optional(root_cert_size, "root certificate")?;
    let rrn_cert_file = reader.take_optional(rrn_cert_size, "national registry certificate")?;
    reader.finish()?;

    Ok(IdentityDataMessage {
        identity_file,
        address_file,
        photo_file,
        identity_signature_file,
        address_signature_file,
        authn_cert_file,
        sign_cert_file,
        ca_cert_file,
        root_cert_file,
        rrn_cert_file,
    }
    .into())
}

fn decode_reader_list(body: Option<&[u8]>) -> Result<Vec<String>, Error> {
    let Some(body) = body else {
        return Ok(Vec::new());
    };
    let text = std::str::from_utf8(body)
        .map_err(|e| Error::Body(format!("reader list is not valid UTF-8: {e}")))?;
    Ok(text
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Encode one message onto the transport response.
pub fn encode<T: HttpTransmitter>(
    message: &ProtocolMessage,
    transmitter: &mut T,
) -> Result<(), Error> {
    let mut writer = Writer { transmitter };
    writer.raw(TYPE_HEADER, &message.message_type().to_string());
    match message {
        ProtocolMessage::Hello(m) => {
            if let Some(language) = &m.language {
                writer.header("Language", language);
            }
            writer.header("RequestId", &m.request_id);
        }
        ProtocolMessage::CheckClient(_) | ProtocolMessage::SignCertificatesRequest(_) => {}
        ProtocolMessage::ClientEnvironment(m) => {
            writer.header("ClientVersion", &m.client_version);
            writer.header("OsName", &m.os_name);
            writer.header("OsArch", &m.os_arch);
            writer.header("OsVersion", &m.os_version);
            if !m.readers.is_empty() {
                writer.body(m.readers.join("\n").into_bytes());
            }
        }
        ProtocolMessage::IdentificationRequest(m) => {
            writer.bool_header("IncludeAddress", m.include_address);
            writer.bool_header("IncludePhoto", m.include_photo);
            writer.bool_header("IncludeCerts", m.include_certificates);
        }
        ProtocolMessage::AuthenticationRequest(m) => {
            writer.body(m.challenge.clone());
        }
        ProtocolMessage::Administration(m) => {
            writer.bool_header("ChangePin", m.change_pin);
            writer.bool_header("UnblockPin", m.unblock_pin);
        }
        ProtocolMessage::SignRequest(m) => {
            writer.header("DigestAlgo", &m.digest_algo);
            if let Some(description) = &m.description {
                writer.header("Description", description);
            }
            writer.body(m.digest_value.clone());
        }
        ProtocolMessage::FilesDigestRequest(m) => {
            writer.header("DigestAlgo", &m.digest_algo);
        }
        ProtocolMessage::FileDigestsData(m) => {
            writer.header("DigestAlgo", &m.digest_algo);
            writer.body(m.file_digests.clone());
        }
        ProtocolMessage::SignCertificatesData(m) => {
            let (body, sizes) = chain_body(&m.certificate_chain)?;
            writer.size_header("SignCertFileSize", sizes[0]);
            writer.size_header("CaCertFileSize", sizes[1]);
            writer.size_header("RootCaCertFileSize", sizes[2]);
            writer.body(body);
        }
        ProtocolMessage::IdentityData(m) => encode_identity_data(m, &mut writer),
        ProtocolMessage::SignatureData(m) => {
            let (chain_bytes, sizes) = chain_body(&m.certificate_chain)?;
            writer.size_header("SignatureValueSize", m.signature_value.len());
            writer.size_header("SignCertFileSize", sizes[0]);
            writer.size_header("CaCertFileSize", sizes[1]);
            writer.size_header("RootCaCertFileSize", sizes[2]);
            let mut body = m.signature_value.clone();
            body.extend_from_slice(&chain_bytes);
            writer.body(body);
        }
        ProtocolMessage::Finished(m) => {
            if let Some(error_code) = m.error_code {
                writer.header("ErrorCode", &error_code.to_string());
            }
        }
    }
    Ok(())
}

fn encode_identity_data<T: HttpTransmitter>(message: &IdentityDataMessage, writer: &mut Writer<'_, T>) {
    let mut body = message.identity_file.clone();
    writer.size_header("IdentityFileSize", message.identity_file.len());
    // body parts in wire order; the size header of an omitted part is absent
    let parts: [(&str, &Option<Vec<u8>>); 9] = [
        ("AddressFileSize", &message.address_file),
        ("PhotoFileSize", &message.photo_file),
        ("IdentitySignatureFileSize", &message.identity_signature_file),
        ("AddressSignatureFileSize", &message.address_signature_file),
        ("AuthnCertFileSize", &message.authn_cert_file),
        ("SignCertFileSize", &message.sign_cert_file),
        ("CaCertFileSize", &message.ca_cert_file),
        ("RootCertFileSize", &message.root_cert_file),
        ("RrnCertFileSize", &message.rrn_cert_file),
    ];
    for (header, part) in parts {
        if let Some(part) = part {
            writer.size_header(header, part.len());
            body.extend_from_slice(part);
        }
    }
    writer.body(body);
}

fn chain_body(chain: &CertificateChain) -> Result<(Vec<u8>, Vec<usize>), Error> {
    if chain.len() != 3 {
        return Err(Error::Framing(format!(
            "certificate chain must hold 3 slots, found {}",
            chain.len()
        )));
    }
    Ok(chain.to_body())
}

struct Headers<'a, R> {
    receiver: &'a R,
}

impl<R: HttpReceiver> Headers<'_, R> {
    fn optional(&self, name: &str) -> Option<String> {
        self.receiver
            .header_value(&format!("{HEADER_PREFIX}{name}"))
            .filter(|value| !value.is_empty())
    }

    fn require(&self, name: &str) -> Result<String, Error> {
        self.optional(name)
            .ok_or_else(|| Error::MissingHeader(format!("{HEADER_PREFIX}{name}")))
    }

    fn require_usize(&self, name: &str) -> Result<usize, Error> {
        let value = self.require(name)?;
        parse_header(name, value)
    }

    fn optional_usize(&self, name: &str) -> Result<Option<usize>, Error> {
        self.optional(name).map(|value| parse_header(name, value)).transpose()
    }

    fn require_bool(&self, name: &str) -> Result<bool, Error> {
        let value = self.require(name)?;
        match value.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(Error::InvalidHeader {
                header: format!("{HEADER_PREFIX}{name}"),
                value,
                reason: "expected true or false".to_string(),
            }),
        }
    }

    fn require_body(&self) -> Result<&[u8], Error> {
        self.receiver.body().ok_or(Error::MissingBody)
    }
}

fn parse_header(name: &str, value: String) -> Result<usize, Error> {
    value.parse().map_err(|_| Error::InvalidHeader {
        header: format!("{HEADER_PREFIX}{name}"),
        value,
        reason: "expected a non-negative integer".to_string(),
    })
}

struct Writer<'a, T> {
    transmitter: &'a mut T,
}

impl<T: HttpTransmitter> Writer<'_, T> {
    fn raw(&mut self, name: &str, value: &str) {
        self.transmitter.add_header(name, value);
    }

    fn header(&mut self, name: &str, value: &str) {
        self.raw(&format!("{HEADER_PREFIX}{name}"), value);
    }

    fn bool_header(&mut self, name: &str, value: bool) {
        self.header(name, if value { "true" } else { "false" });
    }

    fn size_header(&mut self, name: &str, value: usize) {
        self.header(name, &value.to_string());
    }

    fn body(&mut self, body: Vec<u8>) {
        self.transmitter.set_body(body);
    }
}

/// Reads declared-size slices out of a concatenated body.
struct BodyReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BodyReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, size: usize, part: &str) -> Result<&'a [u8], Error> {
        let remaining = self.data.len() - self.pos;
        if size > remaining {
            return Err(Error::Framing(format!(
                "{part} declares {size} bytes but only {remaining} remain"
            )));
        }
        let slice = &self.data[self.pos..self.pos + size];
        self.pos += size;
        Ok(slice)
    }

    fn take_optional(&mut self, size: Option<usize>, part: &str) -> Result<Option<Vec<u8>>, Error> {
        match size {
            None => Ok(None),
            Some(size) => Ok(Some(self.take(size, part)?.to_vec())),
        }
    }

    fn rest(&mut self) -> &'a [u8] {
        let slice = &self.data[self.pos..];
        self.pos = self.data.len();
        slice
    }

    fn finish(self) -> Result<(), Error> {
        let leftover = self.data.len() - self.pos;
        if leftover != 0 {
            return Err(Error::Framing(format!(
                "{leftover} undeclared trailing bytes in the body"
            )));
        }
        Ok(())
    }
}
