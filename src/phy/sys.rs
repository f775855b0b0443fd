use std::io;
use std::net::SocketAddrV4;

/// An IPv4 raw socket with `IP_HDRINCL` set: frames are handed to the
/// kernel with their IP header already in place.
///
/// Opening one requires CAP_NET_RAW (or root); bootstrap probes for this
/// once so a misconfigured service fails loudly instead of per packet.
#[derive(Debug)]
pub struct RawSocket {
    lower: libc::c_int,
}

impl RawSocket {
    pub fn open() -> io::Result<RawSocket> {
        let lower = unsafe { libc::socket(libc::AF_INET, libc::SOCK_RAW, libc::IPPROTO_RAW) };
        if lower == -1 {
            return Err(io::Error::last_os_error());
        }
        let socket = RawSocket { lower };
        socket.set_header_included()?;
        Ok(socket)
    }

    fn set_header_included(&self) -> io::Result<()> {
        let enable: libc::c_int = 1;
        let res = unsafe {
            libc::setsockopt(
                self.lower,
                libc::IPPROTO_IP,
                libc::IP_HDRINCL,
                &enable as *const libc::c_int as *const libc::c_void,
                core::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if res == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    /// Transmit `frame` to `dest`.
    ///
    /// The kernel routes by the destination in the sockaddr, not by the
    /// frame header, so `dest` must agree with the frame's destination
    /// address.
    pub fn send_to(&self, frame: &[u8], dest: SocketAddrV4) -> io::Result<usize> {
        let addr = libc::sockaddr_in {
            sin_family: libc::AF_INET as libc::sa_family_t,
            sin_port: dest.port().to_be(),
            sin_addr: libc::in_addr {
                s_addr: u32::from(*dest.ip()).to_be(),
            },
            sin_zero: [0; 8],
        };
        let len = unsafe {
            libc::sendto(
                self.lower,
                frame.as_ptr() as *const libc::c_void,
                frame.len(),
                0,
                &addr as *const libc::sockaddr_in as *const libc::sockaddr,
                core::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        };
        if len == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(len as usize)
    }
}

impl Drop for RawSocket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.lower);
        }
    }
}
