//! Identity and address records carried on the eID card.
//!
//! Both records are TLV streams with a fixed tag catalogue. Decoding is
//! all-or-nothing: every mandatory tag must be present and convert cleanly,
//! otherwise the whole record fails with an error naming the offending tag.

use time::Date;

use crate::tlv::{self, convert, TagMap};

/// Tag catalogue of the identity file.
mod identity_tag {
    pub const CARD_NUMBER: u8 = 1;
    pub const CHIP_NUMBER: u8 = 2;
    pub const CARD_VALIDITY_BEGIN: u8 = 3;
    pub const CARD_VALIDITY_END: u8 = 4;
    pub const CARD_DELIVERY_MUNICIPALITY: u8 = 5;
    pub const NATIONAL_NUMBER: u8 = 6;
    pub const NAME: u8 = 7;
    pub const FIRST_NAME: u8 = 8;
    pub const MIDDLE_NAME: u8 = 9;
    pub const NATIONALITY: u8 = 10;
    pub const PLACE_OF_BIRTH: u8 = 11;
    pub const DATE_OF_BIRTH: u8 = 12;
    pub const GENDER: u8 = 13;
    pub const NOBLE_CONDITION: u8 = 14;
    pub const DOCUMENT_TYPE: u8 = 15;
    pub const SPECIAL_STATUS: u8 = 16;
    pub const PHOTO_DIGEST: u8 = 17;
    pub const DUPLICATE: u8 = 18;
    pub const SPECIAL_ORGANISATION: u8 = 19;
    pub const MEMBER_OF_FAMILY: u8 = 20;
    pub const DATE_AND_COUNTRY_OF_PROTECTION: u8 = 21;
}

/// Tag catalogue of the address file.
mod address_tag {
    pub const STREET_AND_NUMBER: u8 = 1;
    pub const ZIP: u8 = 2;
    pub const MUNICIPALITY: u8 = 3;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    /// `M` marks a male card holder; female cards carry `F`, `V` or `W`
    /// depending on the card's language.
    fn from_tlv(value: &[u8]) -> Result<Self, convert::Error> {
        let text = std::str::from_utf8(value)?;
        match text {
            "M" => Ok(Gender::Male),
            "F" | "V" | "W" => Ok(Gender::Female),
            _ => Err(convert::Error::Gender {
                value: text.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    BelgianCitizen,
    KidsCard,
    BootstrapCard,
    HabilitationCard,
    ForeignerA,
    ForeignerB,
    ForeignerC,
    ForeignerD,
    ForeignerE,
    ForeignerEPlus,
    ForeignerF,
    ForeignerFPlus,
    /// Card type this server does not know about yet.
    Unknown,
}

impl DocumentType {
    fn from_tlv(value: &[u8]) -> Result<Self, convert::Error> {
        let text = std::str::from_utf8(value)?;
        let code: u32 = text.trim().parse().map_err(|_| convert::Error::DocumentType {
            value: text.to_string(),
        })?;
        let document_type = match code {
            1 => DocumentType::BelgianCitizen,
            6 => DocumentType::KidsCard,
            7 => DocumentType::BootstrapCard,
            8 => DocumentType::HabilitationCard,
            33 => DocumentType::ForeignerA,
            34 => DocumentType::ForeignerB,
            35 => DocumentType::ForeignerC,
            36 => DocumentType::ForeignerD,
            37 => DocumentType::ForeignerE,
            38 => DocumentType::ForeignerEPlus,
            39 => DocumentType::ForeignerF,
            40 => DocumentType::ForeignerFPlus,
            other => {
                tracing::warn!("unknown document type code {other}");
                DocumentType::Unknown
            }
        };
        Ok(document_type)
    }
}

/// Special status markers printed on the card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpecialStatus {
    pub white_cane: bool,
    pub extended_minority: bool,
    pub yellow_cane: bool,
}

impl SpecialStatus {
    fn from_tlv(value: &[u8]) -> Result<Self, convert::Error> {
        let text = std::str::from_utf8(value)?;
        let error = || convert::Error::SpecialStatus {
            value: text.to_string(),
        };
        let code: u32 = text.trim().parse().map_err(|_| error())?;
        let status = match code {
            0 => SpecialStatus::default(),
            1 => SpecialStatus {
                white_cane: true,
                ..Default::default()
            },
            2 => SpecialStatus {
                extended_minority: true,
                ..Default::default()
            },
            3 => SpecialStatus {
                white_cane: true,
                extended_minority: true,
                ..Default::default()
            },
            4 => SpecialStatus {
                yellow_cane: true,
                ..Default::default()
            },
            5 => SpecialStatus {
                yellow_cane: true,
                extended_minority: true,
                ..Default::default()
            },
            _ => return Err(error()),
        };
        Ok(status)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SpecialOrganisation {
    #[default]
    Unspecified,
    Shape,
    Nato,
    FormerBlueCardHolder,
    Researcher,
}

impl SpecialOrganisation {
    fn from_tlv(value: &[u8]) -> Result<Self, convert::Error> {
        let key = std::str::from_utf8(value)?;
        tracing::debug!("special organisation key: {key:?}");
        let organisation = match key {
            "" => SpecialOrganisation::Unspecified,
            "1" => SpecialOrganisation::Shape,
            "2" => SpecialOrganisation::Nato,
            "4" => SpecialOrganisation::FormerBlueCardHolder,
            "5" => SpecialOrganisation::Researcher,
            other => {
                tracing::warn!("unknown special organisation key {other:?}");
                SpecialOrganisation::Unspecified
            }
        };
        Ok(organisation)
    }
}

/// Validity window of the card, derived from the two date tags after the
/// primary decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityPeriod {
    pub begin: Date,
    pub end: Date,
}

impl ValidityPeriod {
    pub fn has_expired(&self, at: Date) -> bool {
        at > self.end
    }
}

/// Identity record of the card holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub card_number: String,
    pub chip_number: String,
    pub card_delivery_municipality: String,
    pub card_validity: ValidityPeriod,
    pub national_number: String,
    pub name: String,
    pub first_name: String,
    pub middle_name: Option<String>,
    pub nationality: String,
    pub place_of_birth: String,
    pub date_of_birth: Date,
    pub gender: Gender,
    pub noble_condition: Option<String>,
    pub document_type: DocumentType,
    pub special_status: SpecialStatus,
    /// Digest of the separately transferred photo file.
    pub photo_digest: Vec<u8>,
    pub duplicate: Option<String>,
    pub special_organisation: SpecialOrganisation,
    pub member_of_family: bool,
    pub date_and_country_of_protection: Option<String>,
}

impl Identity {
    pub fn parse(data: &[u8]) -> Result<Self, tlv::Error> {
        use identity_tag as tag;

        let map = TagMap::parse(data)?;
        let begin = map.require_with(tag::CARD_VALIDITY_BEGIN, "cardValidityDateBegin", convert::date)?;
        let end = map.require_with(tag::CARD_VALIDITY_END, "cardValidityDateEnd", convert::date)?;
        Ok(Identity {
            card_number: map.require_with(tag::CARD_NUMBER, "cardNumber", convert::string)?,
            chip_number: map.require_with(tag::CHIP_NUMBER, "chipNumber", convert::hex_string)?,
            card_delivery_municipality: map.require_with(
                tag::CARD_DELIVERY_MUNICIPALITY,
                "cardDeliveryMunicipality",
                convert::string,
            )?,
            card_validity: ValidityPeriod { begin, end },
            national_number: map.require_with(tag::NATIONAL_NUMBER, "nationalNumber", convert::string)?,
            name: map.require_with(tag::NAME, "name", convert::string)?,
            first_name: map.require_with(tag::FIRST_NAME, "firstName", convert::string)?,
            middle_name: map.optional_with(tag::MIDDLE_NAME, "middleName", convert::string)?,
            nationality: map.require_with(tag::NATIONALITY, "nationality", convert::string)?,
            place_of_birth: map.require_with(tag::PLACE_OF_BIRTH, "placeOfBirth", convert::string)?,
            date_of_birth: map.require_with(tag::DATE_OF_BIRTH, "dateOfBirth", convert::birth_date)?,
            gender: map.require_with(tag::GENDER, "gender", Gender::from_tlv)?,
            noble_condition: map.optional_with(tag::NOBLE_CONDITION, "nobleCondition", convert::string)?,
            document_type: map.require_with(tag::DOCUMENT_TYPE, "documentType", DocumentType::from_tlv)?,
            special_status: map
                .optional_with(tag::SPECIAL_STATUS, "specialStatus", SpecialStatus::from_tlv)?
                .unwrap_or_default(),
            photo_digest: map.require_with(tag::PHOTO_DIGEST, "photoDigest", convert::bytes)?,
            duplicate: map.optional_with(tag::DUPLICATE, "duplicate", convert::string)?,
            special_organisation: map
                .optional_with(
                    tag::SPECIAL_ORGANISATION,
                    "specialOrganisation",
                    SpecialOrganisation::from_tlv,
                )?
                .unwrap_or_default(),
            member_of_family: map.contains(tag::MEMBER_OF_FAMILY),
            date_and_country_of_protection: map.optional_with(
                tag::DATE_AND_COUNTRY_OF_PROTECTION,
                "dateAndCountryOfProtection",
                convert::string,
            )?,
        })
    }
}

/// Address record of the card holder. Address files are zero-padded to a
/// fixed size on the card; the padding is skipped by the TLV scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub street_and_number: String,
    pub zip: String,
    pub municipality: String,
}

impl Address {
    pub fn parse(data: &[u8]) -> Result<Self, tlv::Error> {
        use address_tag as tag;

        let map = TagMap::parse(data)?;
        Ok(Address {
            street_and_number: map.require_with(tag::STREET_AND_NUMBER, "streetAndNumber", convert::string)?,
            zip: map.require_with(tag::ZIP, "zip", convert::string)?,
            municipality: map.require_with(tag::MUNICIPALITY, "municipality", convert::string)?,
        })
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use time::macros::date;

    /// Assembles a plausible identity file for tests; callers override
    /// individual tags by appending (later tags shadow earlier ones).
    pub(crate) fn identity_file(photo_digest: &[u8]) -> Vec<u8> {
        crate::tlv::encode([
            (1, b"592-2500611-33".as_slice()),
            (2, [0x53, 0x4c, 0x49, 0x4e, 0x33, 0x66].as_slice()),
            (3, b"01.09.2021".as_slice()),
            (4, b"01.09.2031".as_slice()),
            (5, b"Gent".as_slice()),
            (6, b"71715100070".as_slice()),
            (7, b"Peeters".as_slice()),
            (8, b"Anna".as_slice()),
            (10, b"Belg".as_slice()),
            (11, b"Leuven".as_slice()),
            (12, b"15 SEP  1971".as_slice()),
            (13, b"V".as_slice()),
            (15, b"1".as_slice()),
            (17, photo_digest),
        ])
    }

    pub(crate) fn address_file() -> Vec<u8> {
        let mut data = crate::tlv::encode([
            (1, b"Veldstraat 12".as_slice()),
            (2, b"9000".as_slice()),
            (3, b"Gent".as_slice()),
        ]);
        data.extend(std::iter::repeat(0).take(23));
        data
    }

    #[test]
    fn parses_identity_file() {
        let identity = Identity::parse(&identity_file(&[0xab; 20])).unwrap();
        assert_eq!(identity.card_number, "592-2500611-33");
        assert_eq!(identity.chip_number, "534C494E3366");
        assert_eq!(identity.national_number, "71715100070");
        assert_eq!(identity.gender, Gender::Female);
        assert_eq!(identity.document_type, DocumentType::BelgianCitizen);
        assert_eq!(identity.date_of_birth, date!(1971 - 09 - 15));
        assert_eq!(
            identity.card_validity,
            ValidityPeriod {
                begin: date!(2021 - 09 - 01),
                end: date!(2031 - 09 - 01),
            }
        );
        assert_eq!(identity.middle_name, None);
        assert!(!identity.member_of_family);
        assert_eq!(identity.special_status, SpecialStatus::default());
        assert_eq!(identity.photo_digest, vec![0xab; 20]);
    }

    #[test]
    fn missing_mandatory_tag_fails_as_a_unit() {
        // strip the national number (tag 6) by rebuilding without it
        let full = identity_file(&[0xab; 20]);
        let stripped: Vec<_> = crate::tlv::Scanner::new(&full)
            .map(Result::unwrap)
            .filter(|e| e.tag != 6)
            .map(|e| (e.tag, e.value.to_vec()))
            .collect();
        let data = crate::tlv::encode(stripped.iter().map(|(t, v)| (*t, v.as_slice())));
        let err = Identity::parse(&data).unwrap_err();
        assert!(matches!(
            err,
            tlv::Error::MissingTag {
                tag: 6,
                field: "nationalNumber"
            }
        ));
    }

    #[test]
    fn unknown_tags_are_skipped() {
        let mut data = identity_file(&[0xab; 20]);
        data.extend(crate::tlv::encode([(200, b"future field".as_slice())]));
        assert!(Identity::parse(&data).is_ok());
    }

    #[test]
    fn parses_zero_padded_address_file() {
        let address = Address::parse(&address_file()).unwrap();
        assert_eq!(address.street_and_number, "Veldstraat 12");
        assert_eq!(address.zip, "9000");
        assert_eq!(address.municipality, "Gent");
    }

    #[test]
    fn card_validity_window() {
        let validity = ValidityPeriod {
            begin: date!(2021 - 09 - 01),
            end: date!(2031 - 09 - 01),
        };
        assert!(!validity.has_expired(date!(2031 - 09 - 01)));
        assert!(validity.has_expired(date!(2031 - 09 - 02)));
    }

    #[test]
    fn special_status_codes() {
        assert_eq!(
            SpecialStatus::from_tlv(b"3").unwrap(),
            SpecialStatus {
                white_cane: true,
                extended_minority: true,
                yellow_cane: false,
            }
        );
        assert!(SpecialStatus::from_tlv(b"9").is_err());
    }
}
