use image::RgbaImage;

use crate::error::RenderError;
use crate::types::ViewportSize;

/// Row pitch for a texture-to-buffer copy of `width` RGBA8 texels.
pub(crate) fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Copies `texture` into host memory as straight-alpha RGBA.
pub(crate) fn read_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    size: ViewportSize,
    format: wgpu::TextureFormat,
) -> Result<RgbaImage, RenderError> {
    let bgra = match format {
        wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => false,
        wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb => true,
        other => {
            return Err(RenderError::Readback(format!(
                "unsupported capture format {other:?}"
            )))
        }
    };

    let padded = padded_bytes_per_row(size.width);
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("gradmap readback"),
        size: padded as u64 * size.height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("gradmap readback encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(size.height),
            },
        },
        wgpu::Extent3d {
            width: size.width,
            height: size.height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    let (tx, rx) = crossbeam_channel::bounded(1);
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device
        .poll(wgpu::PollType::Wait)
        .map_err(|err| RenderError::Readback(err.to_string()))?;
    rx.recv()
        .map_err(|_| RenderError::Readback("map callback never ran".into()))?
        .map_err(|err| RenderError::Readback(err.to_string()))?;

    let pixels = {
        let mapped = slice.get_mapped_range();
        unpad_rows(&mapped, size, padded, bgra)
    };
    buffer.unmap();
    buffer.destroy();

    RgbaImage::from_raw(size.width, size.height, pixels)
        .ok_or_else(|| RenderError::Readback("readback size mismatch".into()))
}

/// Strips row padding, swizzles BGRA, and undoes premultiplied alpha.
pub(crate) fn unpad_rows(data: &[u8], size: ViewportSize, padded: u32, bgra: bool) -> Vec<u8> {
    let row_bytes = (size.width * 4) as usize;
    let mut pixels = Vec::with_capacity(row_bytes * size.height as usize);
    for row in data.chunks(padded as usize).take(size.height as usize) {
        for px in row[..row_bytes].chunks_exact(4) {
            let (mut r, g, mut b, a) = (px[0], px[1], px[2], px[3]);
            if bgra {
                std::mem::swap(&mut r, &mut b);
            }
            pixels.extend(unpremultiply([r, g, b, a]));
        }
    }
    pixels
}

fn unpremultiply([r, g, b, a]: [u8; 4]) -> [u8; 4] {
    if a == 0 || a == 255 {
        return [r, g, b, a];
    }
    let scale = |c: u8| ((c as u32 * 255 + a as u32 / 2) / a as u32).min(255) as u8;
    [scale(r), scale(g), scale(b), a]
}
