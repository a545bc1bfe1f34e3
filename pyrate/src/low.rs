use crate::LinkError;
use embedded_hal::serial;

/// `Channel` is the raw serial link to the host: a transmit half and a
/// receive half, both blocking through `nb::block!` unless stated otherwise.
#[derive(Debug, Clone)]
pub struct Channel<TX: serial::Write<u8>, RX: serial::Read<u8>> {
    pub tx: TX,
    pub rx: RX,
}

impl<TX, RX, TXErr, RXErr> Channel<TX, RX>
where
    TX: serial::Write<u8, Error = TXErr>,
    RX: serial::Read<u8, Error = RXErr>,
{
    pub fn new(tx: TX, rx: RX) -> Self {
        Self { tx, rx }
    }

    pub fn read(&mut self) -> Result<u8, LinkError<TXErr, RXErr>> {
        nb::block!(self.rx.read()).map_err(LinkError::rx)
    }

    /// `try_read` returns the next byte only if one is already waiting.
    pub fn try_read(&mut self) -> Result<Option<u8>, LinkError<TXErr, RXErr>> {
        match self.rx.read() {
            Ok(c) => Ok(Some(c)),
            Err(nb::Error::WouldBlock) => Ok(None),
            Err(nb::Error::Other(err)) => Err(LinkError::rx(err)),
        }
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), LinkError<TXErr, RXErr>> {
        for c in buf.iter_mut() {
            *c = self.read()?;
        }
        Ok(())
    }

    /// `read_u16` reads a big-endian 16-bit count, as used by the paired
    /// write/read commands of the binary protocol.
    pub fn read_u16(&mut self) -> Result<u16, LinkError<TXErr, RXErr>> {
        let mut raw = [0u8; 2];
        self.read_exact(&mut raw)?;
        Ok(u16::from_be_bytes(raw))
    }

    /// `skip` reads and discards `count` bytes.
    pub fn skip(&mut self, count: usize) -> Result<(), LinkError<TXErr, RXErr>> {
        for _ in 0..count {
            self.read()?;
        }
        Ok(())
    }

    pub fn write(&mut self, c: u8) -> Result<(), LinkError<TXErr, RXErr>> {
        nb::block!(self.tx.write(c)).map_err(LinkError::tx)
    }

    pub fn write_all(&mut self, buf: &[u8]) -> Result<(), LinkError<TXErr, RXErr>> {
        for &c in buf {
            self.write(c)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), LinkError<TXErr, RXErr>> {
        nb::block!(self.tx.flush()).map_err(LinkError::tx)
    }

    /// `reply` writes a one-byte status and flushes it, which is how every
    /// binary configuration command answers.
    pub fn reply(&mut self, status: u8) -> Result<(), LinkError<TXErr, RXErr>> {
        self.write(status)?;
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::serial_pair;

    #[test]
    fn big_endian_counts() {
        let (mut ch, _sent) = serial_pair(&[0x01, 0x02, 0xFF]);
        assert_eq!(ch.read_u16().unwrap(), 0x0102);
        assert_eq!(ch.try_read().unwrap(), Some(0xFF));
        assert!(ch.try_read().is_err());
    }

    #[test]
    fn reply_is_flushed() {
        let (mut ch, sent) = serial_pair(&[]);
        ch.reply(0x01).unwrap();
        ch.write_all(b"SPI1").unwrap();
        assert_eq!(&sent.borrow()[..], b"\x01SPI1");
    }
}
