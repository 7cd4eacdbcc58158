// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A headless graphics device that runs on the CPU.

mod device;
mod executor;
mod resources;

pub use device::{DeviceStats, SoftwareDevice, SubmitMode};

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;
    use std::sync::Arc;
    use std::time::Duration;
    use strata_core::math::Extent2D;
    use strata_core::renderer::api::*;
    use strata_core::renderer::{
        Binding, ComputePipeline, GpuBuffer, GpuTexture, GraphicsDevice, KernelError,
        ResourceError, SubmissionError, SubmissionQueue,
    };

    /// Adds the push-constant value to every u32 of binding 0.
    #[derive(Debug)]
    struct AddKernel;

    impl HostKernel for AddKernel {
        fn name(&self) -> &str {
            "add"
        }

        fn dispatch(
            &self,
            _workgroups: [u32; 3],
            push_constants: &[u8],
            resources: &mut [KernelResource],
        ) -> Result<(), KernelError> {
            if push_constants.len() != 4 {
                return Err(KernelError::InvalidPushConstants {
                    expected: 4,
                    actual: push_constants.len(),
                });
            }
            let delta = bytemuck::pod_read_unaligned::<u32>(push_constants);
            let data = resources
                .first_mut()
                .and_then(KernelResource::as_buffer_mut)
                .ok_or(KernelError::BindingMismatch {
                    index: 0,
                    expected: "buffer",
                })?;
            let mut values: Vec<u32> = bytemuck::pod_collect_to_vec(data);
            values.iter_mut().for_each(|v| *v += delta);
            data.copy_from_slice(bytemuck::cast_slice(&values));
            Ok(())
        }
    }

    fn device(mode: SubmitMode) -> (Arc<SoftwareDevice>, Arc<dyn GraphicsDevice>) {
        let concrete = Arc::new(SoftwareDevice::new(mode));
        let dynamic: Arc<dyn GraphicsDevice> = concrete.clone();
        (concrete, dynamic)
    }

    fn storage(device: &Arc<dyn GraphicsDevice>, label: &str, data: &[u8]) -> GpuBuffer {
        GpuBuffer::with_data(
            device,
            label,
            BufferUsage::STORAGE | BufferUsage::COPY_SRC | BufferUsage::COPY_DST,
            data,
        )
        .unwrap()
    }

    #[test]
    fn copies_run_immediately() {
        let (soft, device) = device(SubmitMode::Immediate);
        let queue = SubmissionQueue::new(device.clone(), QueueKind::Transfer).unwrap();
        let src = storage(&device, "src", &[1, 2, 3, 4, 5, 6, 7, 8]);
        let dst = storage(&device, "dst", &[0; 8]);

        let mut stream = queue.acquire_stream();
        stream.copy_buffer(&src, &dst, &[BufferCopy::new(2, 4, 4)]);
        let id = queue.submit(vec![stream]).unwrap();

        assert!(queue.poll(id));
        assert_eq!(dst.read(0, 8).unwrap(), vec![0, 0, 0, 0, 3, 4, 5, 6]);
        let stats = soft.stats();
        assert_eq!(stats.copies, 1);
        assert_eq!(stats.bytes_copied, 4);
    }

    #[test]
    fn host_kernels_write_back_buffers() {
        let (soft, device) = device(SubmitMode::Immediate);
        let queue = SubmissionQueue::new(device.clone(), QueueKind::Compute).unwrap();
        let pipeline = ComputePipeline::new(
            &device,
            &ComputePipelineDescriptor {
                label: Some("add".into()),
                shader: ShaderSource::Host(Arc::new(AddKernel)),
                entry_point: "main".into(),
                push_constant_size: 4,
            },
        )
        .unwrap();
        let values = storage(&device, "values", bytemuck::cast_slice(&[1u32, 2, 3]));

        let mut stream = queue.acquire_stream();
        stream.dispatch(
            &pipeline,
            &[Binding::Buffer {
                binding: 0,
                buffer: &values,
            }],
            &10u32.to_le_bytes(),
            [1, 1, 1],
        );
        queue.submit_and_wait(vec![stream]).unwrap();

        assert_eq!(values.read_pod::<u32>(0, 3).unwrap(), vec![11, 12, 13]);
        assert_eq!(soft.stats().dispatches, 1);
    }

    #[test]
    fn kernel_failures_still_signal_the_timeline() {
        let (soft, device) = device(SubmitMode::Immediate);
        let queue = SubmissionQueue::new(device.clone(), QueueKind::Compute).unwrap();
        let pipeline = ComputePipeline::new(
            &device,
            &ComputePipelineDescriptor {
                label: None,
                shader: ShaderSource::Host(Arc::new(AddKernel)),
                entry_point: "main".into(),
                push_constant_size: 4,
            },
        )
        .unwrap();
        let values = storage(&device, "values", &[0; 4]);

        let mut stream = queue.acquire_stream();
        stream.dispatch(
            &pipeline,
            &[Binding::Buffer {
                binding: 0,
                buffer: &values,
            }],
            &[],
            [1, 1, 1],
        );
        let id = queue.submit(vec![stream]).unwrap();

        assert!(queue.poll(id));
        assert_eq!(soft.stats().failed_submissions, 1);
        assert_eq!(queue.submit(vec![queue.acquire_stream()]).unwrap(), id + 1);
    }

    #[test]
    fn out_of_range_barrier_is_rejected_at_submit() {
        let (soft, device) = device(SubmitMode::Immediate);
        let queue = SubmissionQueue::new(device.clone(), QueueKind::Graphics).unwrap();
        let texture = GpuTexture::new(
            &device,
            &TextureDescriptor {
                label: Some("pyramid".into()),
                size: Extent2D::new(4, 4),
                mip_level_count: 3,
                format: TextureFormat::R32Float,
                usage: TextureUsage::STORAGE | TextureUsage::SAMPLED,
            },
        )
        .unwrap();

        let mut stream = queue.acquire_stream();
        stream.image_barrier(&texture, 2..4, ResourceState::General, ResourceState::ShaderRead);
        let result = queue.submit(vec![stream]);

        assert_eq!(
            result,
            Err(SubmissionError::Device(ResourceError::OutOfBounds))
        );
        assert_eq!(queue.last_submitted(), 0);
        assert_eq!(soft.stats().submissions, 0);
    }

    #[test]
    fn image_barriers_track_per_mip_state() {
        let (soft, device) = device(SubmitMode::Immediate);
        let queue = SubmissionQueue::new(device.clone(), QueueKind::Graphics).unwrap();
        let texture = GpuTexture::new(
            &device,
            &TextureDescriptor {
                label: None,
                size: Extent2D::new(4, 4),
                mip_level_count: 3,
                format: TextureFormat::R32Float,
                usage: TextureUsage::STORAGE,
            },
        )
        .unwrap();

        let mut stream = queue.acquire_stream();
        stream.image_barrier(&texture, 1..3, ResourceState::General, ResourceState::ShaderRead);
        queue.submit_and_wait(vec![stream]).unwrap();

        assert_eq!(
            soft.texture_state(texture.id(), 0),
            Some(ResourceState::Undefined)
        );
        assert_eq!(
            soft.texture_state(texture.id(), 2),
            Some(ResourceState::ShaderRead)
        );
    }

    #[test]
    fn deferred_work_waits_for_an_explicit_pump() {
        let (soft, device) = device(SubmitMode::Deferred);
        let queue = SubmissionQueue::new(device.clone(), QueueKind::Transfer).unwrap();
        let buffer = storage(&device, "buffer", &[0; 4]);

        let mut stream = queue.acquire_stream();
        stream.update_buffer(&buffer, 0, &[9, 9, 9, 9]);
        let first = queue.submit(vec![stream]).unwrap();
        let second = queue.submit(vec![queue.acquire_stream()]).unwrap();

        assert!(!queue.poll(first));
        assert_eq!(soft.pending_submissions(QueueKind::Transfer), 2);

        assert_eq!(soft.execute_pending(QueueKind::Transfer, 1), 1);
        assert!(queue.poll(first));
        assert!(!queue.poll(second));
        assert_eq!(buffer.read(0, 4).unwrap(), vec![9, 9, 9, 9]);

        assert!(queue.wait(second, Duration::from_millis(100)));
        assert_eq!(soft.pending_submissions(QueueKind::Transfer), 0);
    }

    #[test]
    fn cross_queue_waits_hold_the_queue_back() {
        let (soft, device) = device(SubmitMode::Deferred);
        let transfer = SubmissionQueue::new(device.clone(), QueueKind::Transfer).unwrap();
        let graphics = SubmissionQueue::new(device.clone(), QueueKind::Graphics).unwrap();

        graphics.queue_wait(transfer.semaphore(1));
        let draw = graphics.submit(vec![graphics.acquire_stream()]).unwrap();
        assert_eq!(soft.execute_pending(QueueKind::Graphics, usize::MAX), 0);
        assert!(!graphics.poll(draw));

        let upload = transfer.submit(vec![transfer.acquire_stream()]).unwrap();
        assert_eq!(soft.flush(), 2);
        assert!(transfer.poll(upload));
        assert!(graphics.poll(draw));
    }

    #[test]
    fn indirect_count_draws_are_tallied() {
        let (soft, device) = device(SubmitMode::Immediate);
        let queue = SubmissionQueue::new(device.clone(), QueueKind::Graphics).unwrap();
        let draws = [
            DrawCommand {
                index_count: 36,
                instance_count: 1,
                first_index: 0,
                base_vertex: 0,
                base_instance: 0,
                draw_id: 0,
            },
            DrawCommand {
                index_count: 6,
                instance_count: 1,
                first_index: 36,
                base_vertex: 8,
                base_instance: 1,
                draw_id: 1,
            },
        ];
        let commands = storage(&device, "commands", bytemuck::cast_slice(&draws));
        let count = storage(&device, "count", &2u32.to_le_bytes());

        let mut stream = queue.acquire_stream();
        stream.draw_indexed_indirect_count(&commands, &count, 8, size_of::<DrawCommand>() as u32);
        queue.submit_and_wait(vec![stream]).unwrap();

        let stats = soft.stats();
        assert_eq!(stats.indirect_draw_count, 2);
        assert_eq!(stats.draw_calls, 2);
        assert_eq!(stats.indices_drawn, 42);
    }

    #[test]
    fn allocation_tracking_follows_handles() {
        let (soft, device) = device(SubmitMode::Immediate);
        {
            let _a = storage(&device, "a", &[0; 64]);
            let _b = storage(&device, "b", &[0; 32]);
            assert_eq!(soft.allocated_bytes(), 96);
        }
        assert_eq!(soft.allocated_bytes(), 0);
        assert_eq!(soft.peak_bytes(), 96);
    }

    #[test]
    fn spirv_compute_is_not_supported() {
        let (_, device) = device(SubmitMode::Immediate);
        let result = device.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("cull".into()),
            shader: ShaderSource::SpirV(Arc::from(vec![0x0723_0203u32])),
            entry_point: "main".into(),
            push_constant_size: 0,
        });
        assert!(matches!(result, Err(ResourceError::Pipeline(_))));
    }

    #[test]
    fn zero_timeout_polls_fences() {
        let (_, device) = device(SubmitMode::Deferred);
        let fence = device.create_fence().unwrap();
        device
            .submit(QueueSubmission {
                queue: QueueKind::Compute,
                fence: Some(fence),
                ..Default::default()
            })
            .unwrap();
        // A blocking wait pumps the deferred queue itself.
        assert_eq!(device.wait_fence(fence, Some(Duration::ZERO)), Ok(true));
    }
}
