//! Core protocol types: the values that travel on the wire.

use std::fmt;
use std::str::FromStr;

use crate::FormatError;

// ---------------------------------------------------------------------------
// Message ids and limits
// ---------------------------------------------------------------------------

/// First byte of a batch submit (client → server).
pub const BATCH_MSG_ID: u8 = 0x01;

/// Confirmation byte: the batch was accepted. Also the client's final ack
/// after the winners announcement.
pub const ACK: u8 = 0x01;

/// Confirmation byte: the peer rejected the batch.
pub const ERR: u8 = 0x02;

/// First byte of the winners announcement (server → client).
pub const WINNERS_MSG_ID: u8 = 0x03;

/// Fixed width of the birth date field.
pub const BIRTH_DATE_LEN: usize = 10;

/// Longest name or surname a one-byte length prefix can describe.
pub const MAX_FIELD_LEN: usize = u8::MAX as usize;

/// Most bets a one-byte count can describe.
pub const MAX_BATCH_LEN: usize = u8::MAX as usize;

/// `msg_id + client_id + is_last + count`.
pub const BATCH_HEADER_LEN: usize = 4;

// ---------------------------------------------------------------------------
// ClientId
// ---------------------------------------------------------------------------

/// The agency submitting bets. Framed in one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub u8);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for ClientId {
    fn from(id: u8) -> Self {
        Self(id)
    }
}

/// Parses the decimal text form used in configuration.
impl FromStr for ClientId {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .map(Self)
            .map_err(|_| FormatError::InvalidClientId(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Bet
// ---------------------------------------------------------------------------

/// One wager submission.
///
/// Built once from textual input before the session starts and never
/// mutated afterwards. The constructors validate the length rules; a
/// struct literal skips them, so the encoder checks again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bet {
    pub name: String,
    pub surname: String,
    pub id: u32,
    /// Exactly ten characters. The format inside is not checked.
    pub birth_date: String,
    pub chosen_number: u16,
}

impl Bet {
    /// Creates a validated bet.
    pub fn new(
        name: impl Into<String>,
        surname: impl Into<String>,
        id: u32,
        birth_date: impl Into<String>,
        chosen_number: u16,
    ) -> Result<Self, FormatError> {
        let bet = Self {
            name: name.into(),
            surname: surname.into(),
            id,
            birth_date: birth_date.into(),
            chosen_number,
        };
        bet.validate()?;
        Ok(bet)
    }

    /// Creates a validated bet from its five textual fields.
    ///
    /// `id` must fit in 32 bits and `chosen_number` in 16, both decimal.
    pub fn parse(
        name: &str,
        surname: &str,
        id: &str,
        birth_date: &str,
        chosen_number: &str,
    ) -> Result<Self, FormatError> {
        let id = id.trim().parse::<u32>().map_err(|_| {
            FormatError::InvalidNumber {
                field: "id",
                value: id.to_string(),
            }
        })?;
        let chosen_number =
            chosen_number.trim().parse::<u16>().map_err(|_| {
                FormatError::InvalidNumber {
                    field: "chosen_number",
                    value: chosen_number.to_string(),
                }
            })?;
        Self::new(name, surname, id, birth_date, chosen_number)
    }

    /// Checks the framing limits: text fields fit in one length byte and
    /// the birth date is exactly ten bytes.
    pub fn validate(&self) -> Result<(), FormatError> {
        check_field_len("name", &self.name)?;
        check_field_len("surname", &self.surname)?;
        if self.birth_date.len() != BIRTH_DATE_LEN {
            return Err(FormatError::InvalidBirthDate {
                len: self.birth_date.len(),
            });
        }
        Ok(())
    }

    /// Number of bytes this bet occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        1 + self.name.len() + 1 + self.surname.len() + 4 + BIRTH_DATE_LEN + 2
    }
}

fn check_field_len(field: &'static str, value: &str) -> Result<(), FormatError> {
    if value.len() > MAX_FIELD_LEN {
        return Err(FormatError::FieldTooLong {
            field,
            len: value.len(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Batch
// ---------------------------------------------------------------------------

/// A bounded run of bets sent as one framed message.
///
/// Borrows the bets from the caller's record list; built fresh for every
/// iteration of the session loop.
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    pub client_id: ClientId,
    pub is_last: bool,
    pub bets: &'a [Bet],
}

impl<'a> Batch<'a> {
    pub fn new(client_id: ClientId, bets: &'a [Bet], is_last: bool) -> Self {
        Self {
            client_id,
            is_last,
            bets,
        }
    }

    /// Encodes the batch. See [`encode_batch`](crate::encode_batch).
    pub fn encode(&self) -> Result<Vec<u8>, FormatError> {
        crate::encode_batch(self.bets, self.client_id, self.is_last)
    }
}

/// An owned batch, as read back by [`decode_batch`](crate::decode_batch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBatch {
    pub client_id: ClientId,
    pub is_last: bool,
    pub bets: Vec<Bet>,
}

// ---------------------------------------------------------------------------
// Replies from the peer
// ---------------------------------------------------------------------------

/// The peer's one-byte answer to a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// `ACK`: the batch was stored.
    Ack,
    /// `ERR`: the peer rejected the batch's content. Recoverable; the
    /// session skips the batch and carries on.
    Rejected,
}

/// The result announcement sent once every batch has been processed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WinnersAnnouncement {
    /// Winning ids, in the order the peer sent them.
    pub ids: Vec<u32>,
}

impl WinnersAnnouncement {
    /// The announced winners count.
    pub fn count(&self) -> usize {
        self.ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_parses_decimal_range() {
        assert_eq!("0".parse::<ClientId>().unwrap(), ClientId(0));
        assert_eq!(" 255 ".parse::<ClientId>().unwrap(), ClientId(255));
        assert!(matches!(
            "256".parse::<ClientId>(),
            Err(FormatError::InvalidClientId(s)) if s == "256"
        ));
        assert!("-1".parse::<ClientId>().is_err());
        assert!("agency".parse::<ClientId>().is_err());
    }

    #[test]
    fn test_bet_parse_valid() {
        let bet =
            Bet::parse("Ana", "Paz", "30904465", "1999-03-17", "7574").unwrap();
        assert_eq!(bet.id, 30_904_465);
        assert_eq!(bet.chosen_number, 7574);
        assert_eq!(bet.birth_date, "1999-03-17");
    }

    #[test]
    fn test_bet_parse_rejects_oversize_numbers() {
        // 2^32 does not fit the id field.
        let err = Bet::parse("A", "B", "4294967296", "1999-03-17", "1")
            .unwrap_err();
        assert!(matches!(err, FormatError::InvalidNumber { field: "id", .. }));

        let err = Bet::parse("A", "B", "1", "1999-03-17", "65536").unwrap_err();
        assert!(matches!(
            err,
            FormatError::InvalidNumber { field: "chosen_number", .. }
        ));
    }

    #[test]
    fn test_bet_new_rejects_bad_birth_date() {
        for date in ["1999-3-17", "1999-03-170"] {
            let err = Bet::new("A", "B", 1, date, 1).unwrap_err();
            assert!(matches!(err, FormatError::InvalidBirthDate { .. }));
        }
    }

    #[test]
    fn test_bet_new_rejects_long_names() {
        let long = "x".repeat(256);
        let err = Bet::new(long.clone(), "B", 1, "1999-03-17", 1).unwrap_err();
        assert_eq!(err, FormatError::FieldTooLong { field: "name", len: 256 });

        let err = Bet::new("A", long, 1, "1999-03-17", 1).unwrap_err();
        assert_eq!(
            err,
            FormatError::FieldTooLong { field: "surname", len: 256 }
        );

        // 255 is still fine.
        assert!(Bet::new("x".repeat(255), "B", 1, "1999-03-17", 1).is_ok());
    }

    #[test]
    fn test_encoded_len_counts_bytes_not_chars() {
        let bet = Bet::new("Íñigo", "Núñez", 1, "1999-03-17", 1).unwrap();
        // "Íñigo" is 7 bytes, "Núñez" is 7 bytes.
        assert_eq!(bet.encoded_len(), 1 + 7 + 1 + 7 + 4 + 10 + 2);
    }

    #[test]
    fn test_winners_count() {
        let w = WinnersAnnouncement { ids: vec![7, 42] };
        assert_eq!(w.count(), 2);
        assert_eq!(WinnersAnnouncement::default().count(), 0);
    }
}
