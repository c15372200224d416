//! RSA key provisioning

use bytes::Bytes;
use pinpad_core::{Coprocessor, Error, PedStatus, Request, Result};

use crate::pinpad::{PinPad, submit};

/// Raw result of an RSA computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaOutput {
    /// Co-processor status, returned unchanged
    pub status: PedStatus,
    /// Output data, empty unless the status is success
    pub data: Bytes,
}

impl<C: Coprocessor> PinPad<C> {
    /// Store an RSA key and return the co-processor status unchanged
    pub fn write_rsa_key(
        &self,
        index: u32,
        modulus: &[u8],
        exponent: &[u8],
        key_info: &[u8],
    ) -> Result<PedStatus> {
        let slot = self.config.registry.rsa(index)?;
        if modulus.is_empty() {
            return Err(Error::InvalidInput("RSA modulus is empty"));
        }
        if exponent.is_empty() {
            return Err(Error::InvalidInput("RSA exponent is empty"));
        }

        let request = Request::RsaWrite {
            slot,
            modulus: Bytes::copy_from_slice(modulus),
            exponent: Bytes::copy_from_slice(exponent),
            key_info: Bytes::copy_from_slice(key_info),
        };
        Ok(submit(&self.ped, &request)?.status)
    }

    /// Run a raw RSA operation with a stored key
    pub fn compute_rsa(&self, index: u32, data: &[u8]) -> Result<RsaOutput> {
        let slot = self.config.registry.rsa(index)?;
        if data.is_empty() {
            return Err(Error::InvalidInput("RSA input is empty"));
        }

        let request = Request::RsaCompute {
            slot,
            data: Bytes::copy_from_slice(data),
        };
        let reply = submit(&self.ped, &request)?;
        Ok(RsaOutput {
            status: reply.status,
            data: reply.data,
        })
    }
}

#[cfg(test)]
mod tests {
    use pinpad_core::{KeyKind, TransportError};
    use pinpad_soft::{SoftPed, status};

    use super::*;

    #[test]
    fn test_status_passes_through() {
        let pinpad = PinPad::new(SoftPed::new());

        let out = pinpad.compute_rsa(2, &[1, 2, 3]).unwrap();
        assert_eq!(out.status, status::NO_KEY);
        assert!(out.data.is_empty());

        assert_eq!(pinpad.write_rsa_key(2, &[0xC3; 128], &[1, 0, 1], b"").unwrap(), PedStatus::OK);
        assert!(pinpad.key_exists(KeyKind::Rsa, 2).unwrap());
        assert_eq!(pinpad.compute_rsa(2, &[1, 2, 3]).unwrap().status, status::ENGINE_UNAVAILABLE);
    }

    #[test]
    fn test_validation_and_transport() {
        let pinpad = PinPad::new(SoftPed::new());

        assert_eq!(pinpad.write_rsa_key(10, &[1], &[3], &[]).unwrap_err().code(), 5);
        assert_eq!(pinpad.write_rsa_key(0, &[], &[3], &[]).unwrap_err().code(), 238);
        assert_eq!(pinpad.write_rsa_key(0, &[1], &[], &[]).unwrap_err().code(), 238);
        assert_eq!(pinpad.compute_rsa(0, &[]).unwrap_err().code(), 238);

        pinpad.coprocessor().lock().faults_mut().transport_failure = true;
        assert!(matches!(
            pinpad.compute_rsa(0, &[1]),
            Err(Error::Communication(TransportError::Connection))
        ));
    }
}
