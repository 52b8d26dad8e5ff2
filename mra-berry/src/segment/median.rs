//! 选择性中值滤波.
//!
//! 只替换明显高于切片统计量的亮噪声样本: 像素值超过
//! `切片均值 + k * σ` 时, 用以它为中心的 `(2r+1)²` 窗口中值覆盖.
//! 血管本身是亮结构, 但成片出现; 孤立亮点大多是噪声.

use log::debug;
use ndarray::Array2;

use crate::{CancelToken, Result, Volume};

/// 对体数据逐切片做选择性中值滤波. `size` 为窗口半径 (体素),
/// `std_dev_factor` 为替换门限的标准差倍率.
pub fn median_filter(
    vol: &mut Volume<u16>,
    size: usize,
    std_dev_factor: f64,
    cancel: &CancelToken,
) -> Result<()> {
    let (zs, _, _) = vol.shape();
    let mut replaced = 0usize;
    for z in 0..zs {
        cancel.check()?;
        replaced += filter_slice(vol, z, size, std_dev_factor);
    }
    debug!("median filter: replaced {replaced} samples");
    Ok(())
}

/// 滤一层切片, 返回替换样本数. 窗口取值来自滤波前的切片副本.
fn filter_slice(vol: &mut Volume<u16>, z: usize, size: usize, std_dev_factor: f64) -> usize {
    let (mean, std) = vol.slice_at(z).mean_std();
    let threshold = mean + std_dev_factor * std;
    let orig: Array2<u16> = vol.slice_at(z).array_view().to_owned();
    let (hs, ws) = orig.dim();
    let mut replaced = 0usize;

    let mut window = Vec::with_capacity((2 * size + 1) * (2 * size + 1));
    for h in 0..hs {
        for w in 0..ws {
            if (orig[(h, w)] as f64) <= threshold {
                continue;
            }
            window.clear();
            for nh in h.saturating_sub(size)..=(h + size).min(hs - 1) {
                for nw in w.saturating_sub(size)..=(w + size).min(ws - 1) {
                    window.push(orig[(nh, nw)]);
                }
            }
            window.sort_unstable();
            let median = window[window.len() / 2];
            if median != orig[(h, w)] {
                vol[(z, h, w)] = median;
                replaced += 1;
            }
        }
    }
    replaced
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        /// 借助 `rayon` 并行滤波全部切片. 语义与
        /// [`median_filter`] 一致 (切片之间相互独立).
        pub fn median_filter_par(vol: &mut Volume<u16>, size: usize, std_dev_factor: f64) {
            use ndarray::Axis;
            use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};

            let orig = vol.data().to_owned();
            vol.data_mut()
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .for_each(|(z, mut out)| {
                    let sli = orig.index_axis(Axis(0), z);
                    let n = sli.len() as f64;
                    let mean = sli.iter().map(|&v| v as f64).sum::<f64>() / n;
                    let var = sli.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
                    let threshold = mean + std_dev_factor * var.sqrt();
                    let (hs, ws) = sli.dim();
                    let mut window = Vec::with_capacity((2 * size + 1) * (2 * size + 1));
                    for h in 0..hs {
                        for w in 0..ws {
                            if (sli[(h, w)] as f64) <= threshold {
                                continue;
                            }
                            window.clear();
                            for nh in h.saturating_sub(size)..=(h + size).min(hs - 1) {
                                for nw in w.saturating_sub(size)..=(w + size).min(ws - 1) {
                                    window.push(sli[(nh, nw)]);
                                }
                            }
                            window.sort_unstable();
                            out[(h, w)] = window[window.len() / 2];
                        }
                    }
                });
        }
    }
}
