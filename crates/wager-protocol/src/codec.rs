//! Encoding and decoding of the binary wire format.
//!
//! All integers are unsigned big-endian. Variable-length text is framed
//! with a one-byte length prefix.
//!
//! ```text
//! batch:   [0x01][client_id:u8][is_last:u8][count:u8][bet]...
//! bet:     [name_len:u8][name][surname_len:u8][surname]
//!          [id:u32][birth_date:10][chosen_number:u16]
//! confirm: [ACK | ERR]
//! winners: [0x03][count:u8][id:u32]...
//! ```
//!
//! Batch encoding is pure. The winners decode reads from a live stream
//! and checks the cancellation token before every read.

use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use wager_transport::read_full;

use crate::types::{
    ACK, BATCH_HEADER_LEN, BATCH_MSG_ID, BIRTH_DATE_LEN, ERR, MAX_BATCH_LEN,
    WINNERS_MSG_ID,
};
use crate::{
    Bet, ClientId, Confirmation, DecodedBatch, FormatError, ProtocolError,
    WinnersAnnouncement,
};

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encodes a batch submit message.
///
/// All-or-nothing: if any bet is invalid, or there are more than 255 of
/// them, nothing is returned but the error.
pub fn encode_batch(
    bets: &[Bet],
    client_id: ClientId,
    is_last: bool,
) -> Result<Vec<u8>, FormatError> {
    if bets.len() > MAX_BATCH_LEN {
        return Err(FormatError::BatchTooLarge(bets.len()));
    }

    let body: usize = bets.iter().map(Bet::encoded_len).sum();
    let mut data = Vec::with_capacity(BATCH_HEADER_LEN + body);
    data.push(BATCH_MSG_ID);
    data.push(client_id.0);
    data.push(u8::from(is_last));
    data.push(bets.len() as u8);

    for bet in bets {
        encode_bet_into(bet, &mut data)?;
    }
    Ok(data)
}

/// Encodes a single bet in its embedded form.
pub fn encode_bet(bet: &Bet) -> Result<Vec<u8>, FormatError> {
    let mut data = Vec::with_capacity(bet.encoded_len());
    encode_bet_into(bet, &mut data)?;
    Ok(data)
}

fn encode_bet_into(bet: &Bet, out: &mut Vec<u8>) -> Result<(), FormatError> {
    bet.validate()?;

    // Lengths were checked by validate, the casts cannot truncate.
    out.push(bet.name.len() as u8);
    out.extend_from_slice(bet.name.as_bytes());
    out.push(bet.surname.len() as u8);
    out.extend_from_slice(bet.surname.as_bytes());
    out.extend_from_slice(&bet.id.to_be_bytes());
    out.extend_from_slice(bet.birth_date.as_bytes());
    out.extend_from_slice(&bet.chosen_number.to_be_bytes());
    Ok(())
}

/// The client's final acknowledgment after the winners announcement.
pub fn encode_final_ack() -> [u8; 1] {
    [ACK]
}

// ---------------------------------------------------------------------------
// Decoding: frames
// ---------------------------------------------------------------------------

/// Decodes a complete batch submit message, the way the peer reads it.
pub fn decode_batch(data: &[u8]) -> Result<DecodedBatch, FormatError> {
    let mut frame = Frame::new(data);

    let msg_id = frame.u8()?;
    if msg_id != BATCH_MSG_ID {
        return Err(FormatError::UnexpectedMessageId {
            expected: BATCH_MSG_ID,
            actual: msg_id,
        });
    }
    let client_id = ClientId(frame.u8()?);
    let is_last = frame.u8()? != 0;
    let count = frame.u8()? as usize;

    let mut bets = Vec::with_capacity(count);
    for _ in 0..count {
        bets.push(frame.bet()?);
    }

    if frame.remaining() > 0 {
        return Err(FormatError::TrailingBytes(frame.remaining()));
    }

    Ok(DecodedBatch {
        client_id,
        is_last,
        bets,
    })
}

/// Decodes one embedded bet. The input must hold exactly one bet.
pub fn decode_bet(data: &[u8]) -> Result<Bet, FormatError> {
    let mut frame = Frame::new(data);
    let bet = frame.bet()?;
    if frame.remaining() > 0 {
        return Err(FormatError::TrailingBytes(frame.remaining()));
    }
    Ok(bet)
}

/// Cursor over an in-memory frame.
struct Frame<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Frame<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        if self.remaining() < n {
            return Err(FormatError::Truncated {
                needed: n,
                remaining: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.array::<1>()?[0])
    }

    fn text(
        &mut self,
        field: &'static str,
        len: usize,
    ) -> Result<String, FormatError> {
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| FormatError::InvalidUtf8 { field })
    }

    fn bet(&mut self) -> Result<Bet, FormatError> {
        let name_len = self.u8()? as usize;
        let name = self.text("name", name_len)?;
        let surname_len = self.u8()? as usize;
        let surname = self.text("surname", surname_len)?;
        let id = u32::from_be_bytes(self.array()?);
        let birth_date = self.text("birth_date", BIRTH_DATE_LEN)?;
        let chosen_number = u16::from_be_bytes(self.array()?);
        Ok(Bet {
            name,
            surname,
            id,
            birth_date,
            chosen_number,
        })
    }
}

// ---------------------------------------------------------------------------
// Decoding: replies from the peer
// ---------------------------------------------------------------------------

/// Interprets the one-byte answer to a batch.
///
/// `ERR` is a peer-signaled rejection, not a failure of the exchange, so
/// it comes back as `Ok(Confirmation::Rejected)`.
pub fn decode_confirmation(byte: u8) -> Result<Confirmation, ProtocolError> {
    match byte {
        ACK => Ok(Confirmation::Ack),
        ERR => Ok(Confirmation::Rejected),
        other => Err(ProtocolError::UnexpectedConfirmation(other)),
    }
}

/// Reads the winners announcement from `reader`.
///
/// Every read is preceded by a check of `cancel` and raced against it, so
/// a cancellation aborts the decode without finishing the read in flight.
pub async fn decode_winners_announcement<R>(
    reader: &mut R,
    cancel: &CancellationToken,
) -> Result<WinnersAnnouncement, ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut byte = [0u8; 1];

    read_step(reader, &mut byte, cancel).await?;
    if byte[0] != WINNERS_MSG_ID {
        return Err(ProtocolError::UnexpectedMessageId {
            expected: WINNERS_MSG_ID,
            actual: byte[0],
        });
    }

    read_step(reader, &mut byte, cancel).await?;
    let count = byte[0] as usize;

    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        let mut id = [0u8; 4];
        read_step(reader, &mut id, cancel).await?;
        ids.push(u32::from_be_bytes(id));
    }

    Ok(WinnersAnnouncement { ids })
}

async fn read_step<R>(
    reader: &mut R,
    buf: &mut [u8],
    cancel: &CancellationToken,
) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    if cancel.is_cancelled() {
        return Err(ProtocolError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProtocolError::Cancelled),
        result = read_full(reader, buf) => {
            result?;
            Ok(())
        }
    }
}
