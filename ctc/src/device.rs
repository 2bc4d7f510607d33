use candle_core::{Device, Result};

pub fn get_device() -> Result<Device> {
    #[cfg(feature = "cuda")]
    if let Ok(device) = Device::cuda_if_available(0) {
        if device.is_cuda() {
            log::info!("Using CUDA device");
            return Ok(device);
        }
    }

    #[cfg(feature = "metal")]
    if let Ok(device) = Device::new_metal(0) {
        if device.is_metal() {
            log::info!("Using Metal device");
            return Ok(device);
        }
    }

    log::info!("Using CPU device");
    Ok(Device::Cpu)
}
